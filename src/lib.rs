#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

use core::fmt::{self, Display};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use exr::image::write::WritableImage;
use exr::image::{Blocks, Encoding, Image, Layer, SpecificChannels};
use exr::math::Vec2;
use exr::meta::attribute::LineOrder;
use exr::meta::header::LayerAttributes;
use thiserror::Error;

pub use exr::compression::Compression;
pub use exr::prelude::f16;

/// writer error
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// the pixel slice holds fewer than `width * height` records
	#[error("pixel buffer too small: need {required} pixels, got {actual}")]
	BufferTooSmall {
		/// `width * height`
		required: usize,
		/// length of the slice that was passed in
		actual: usize,
	},
	/// [`PixelBuffer::from_pixels`] got a vector whose length isn't `width * height`
	#[error("pixel buffer has {actual} pixels, expected {expected}")]
	BufferLength {
		/// `width * height`
		expected: usize,
		/// length of the vector that was passed in
		actual: usize,
	},
	/// `width * height` doesn't fit in a `usize`
	#[error("image dimensions overflow usize")]
	TooLargeForUsize,
	/// the output target couldn't be opened
	#[error("can't open {}: {source}", path.display())]
	Open {
		/// path of the target
		path: PathBuf,
		/// error reported by the OS
		source: io::Error,
	},
	/// the image codec failed while writing
	#[error("image writer failed: {0}")]
	Codec(#[from] exr::error::Error),
}

/// alias for `Result<T, Error>`
pub type Result<T> = core::result::Result<T, Error>;

/// pixel record: four half-float channels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Rgba {
	/// red
	pub r: f16,
	/// green
	pub g: f16,
	/// blue
	pub b: f16,
	/// alpha
	pub a: f16,
}

impl Rgba {
	/// all channels zero
	pub const ZERO: Self = Self::new(f16::ZERO, f16::ZERO, f16::ZERO, f16::ZERO);

	/// pixel from half-float channels
	pub const fn new(r: f16, g: f16, b: f16, a: f16) -> Self {
		Self { r, g, b, a }
	}

	/// pixel from `f32` channels, rounded to the nearest `f16`
	pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
		Self::new(
			f16::from_f32(r),
			f16::from_f32(g),
			f16::from_f32(b),
			f16::from_f32(a),
		)
	}
}

fn pixel_count(width: usize, height: usize) -> Result<usize> {
	width.checked_mul(height).ok_or(Error::TooLargeForUsize)
}

/// row-major buffer of exactly `width * height` pixels.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
	width: usize,
	height: usize,
	pixels: Vec<Rgba>,
}

impl PixelBuffer {
	/// buffer with every pixel set to [`Rgba::ZERO`]
	pub fn zeroed(width: usize, height: usize) -> Result<Self> {
		let count = pixel_count(width, height)?;
		Ok(Self {
			width,
			height,
			pixels: vec![Rgba::ZERO; count],
		})
	}

	/// wrap an existing vector. its length must be exactly `width * height`.
	pub fn from_pixels(width: usize, height: usize, pixels: Vec<Rgba>) -> Result<Self> {
		let expected = pixel_count(width, height)?;
		if pixels.len() != expected {
			return Err(Error::BufferLength {
				expected,
				actual: pixels.len(),
			});
		}
		Ok(Self {
			width,
			height,
			pixels,
		})
	}

	/// width of image in pixels
	pub fn width(&self) -> usize {
		self.width
	}

	/// height of image in pixels
	pub fn height(&self) -> usize {
		self.height
	}

	/// all pixels, row 0 first
	pub fn pixels(&self) -> &[Rgba] {
		&self.pixels
	}
}

/// stream that accepts and drops every byte.
///
/// unlike [`std::io::Sink`] this is seekable, which the EXR writer needs
/// to go back and fill in its offset tables. it remembers how far the
/// stream was ever written, see [`Discard::len`].
#[derive(Debug, Default, Clone)]
pub struct Discard {
	position: u64,
	len: u64,
}

impl Discard {
	/// new empty sink
	pub fn new() -> Self {
		Self::default()
	}

	/// length of the stream that would have been written
	pub fn len(&self) -> u64 {
		self.len
	}

	/// has nothing been written?
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}

impl Write for Discard {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.position += buf.len() as u64;
		self.len = self.len.max(self.position);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl Seek for Discard {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		let position = match pos {
			SeekFrom::Start(n) => Some(n),
			SeekFrom::End(delta) => self.len.checked_add_signed(delta),
			SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
		};
		let Some(position) = position else {
			return Err(io::Error::new(
				io::ErrorKind::InvalidInput,
				"seek to a negative or overflowing position",
			));
		};
		self.position = position;
		Ok(position)
	}
}

/// tracks the furthest byte written through it.
///
/// a null device reports position 0 after every seek, so the end is kept
/// as a running maximum rather than read back from the stream.
struct Counted<W> {
	inner: W,
	position: u64,
	end: u64,
}

impl<W> From<W> for Counted<W> {
	fn from(inner: W) -> Self {
		Self {
			inner,
			position: 0,
			end: 0,
		}
	}
}

impl<W: Write> Write for Counted<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let count = self.inner.write(buf)?;
		self.position += count as u64;
		self.end = self.end.max(self.position);
		Ok(count)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

impl<W: Seek> Seek for Counted<W> {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		let position = self.inner.seek(pos)?;
		self.position = position;
		Ok(position)
	}
}

/// where an image gets written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// a fresh in-process [`Discard`] sink for every write
	Discard,
	/// the platform's null device (`/dev/null`, or `NUL` on windows)
	NullDevice,
	/// a regular file, created or truncated
	File(PathBuf),
}

impl Target {
	/// path of the null device on this platform
	pub fn null_device_path() -> &'static Path {
		if cfg!(windows) {
			Path::new("NUL")
		} else {
			Path::new("/dev/null")
		}
	}

	fn path(&self) -> Option<&Path> {
		match self {
			Self::Discard => None,
			Self::NullDevice => Some(Self::null_device_path()),
			Self::File(path) => Some(path),
		}
	}
}

impl Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.path() {
			None => write!(f, "discard sink"),
			Some(path) => write!(f, "{}", path.display()),
		}
	}
}

/// what a single [`write_image`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
	/// number of scanlines handed to the codec
	pub scanlines: usize,
	/// size of the encoded file in bytes
	pub bytes: u64,
}

/// compression used by [`write_image`]. this is the default for RGBA
/// output files in the reference OpenEXR library.
pub const DEFAULT_COMPRESSION: Compression = Compression::ZIP16;

/// write `pixels` as a `width`×`height` half-float RGBA image to `target`.
///
/// `pixels` is read row-major and must hold at least `width * height`
/// records; anything past that is ignored. scanlines are encoded in
/// increasing order on the calling thread. an image with no pixels
/// leaves the target untouched.
pub fn write_image(
	target: &Target,
	pixels: &[Rgba],
	width: usize,
	height: usize,
) -> Result<WriteReport> {
	write_image_with_compression(target, pixels, width, height, DEFAULT_COMPRESSION)
}

/// [`write_image`] with a specific compression method
pub fn write_image_with_compression(
	target: &Target,
	pixels: &[Rgba],
	width: usize,
	height: usize,
	compression: Compression,
) -> Result<WriteReport> {
	check_buffer(pixels, width, height)?;
	if width == 0 || height == 0 {
		log::debug!("skipping empty {width}×{height} image");
		return Ok(WriteReport::default());
	}

	match target.path() {
		None => encode(Discard::new(), pixels, width, height, compression),
		Some(path) => {
			let file = File::create(path).map_err(|source| Error::Open {
				path: path.to_path_buf(),
				source,
			})?;
			encode(file, pixels, width, height, compression)
		}
	}
}

/// [`write_image_with_compression`] into any seekable stream
pub fn write_image_to<W: Write + Seek>(
	writer: W,
	pixels: &[Rgba],
	width: usize,
	height: usize,
	compression: Compression,
) -> Result<WriteReport> {
	check_buffer(pixels, width, height)?;
	if width == 0 || height == 0 {
		log::debug!("skipping empty {width}×{height} image");
		return Ok(WriteReport::default());
	}
	encode(writer, pixels, width, height, compression)
}

fn check_buffer(pixels: &[Rgba], width: usize, height: usize) -> Result<()> {
	let required = pixel_count(width, height)?;
	if pixels.len() < required {
		return Err(Error::BufferTooSmall {
			required,
			actual: pixels.len(),
		});
	}
	Ok(())
}

/// width and height must be nonzero and covered by `pixels`.
fn encode<W: Write + Seek>(
	writer: W,
	pixels: &[Rgba],
	width: usize,
	height: usize,
	compression: Compression,
) -> Result<WriteReport> {
	// the codec asks for every pixel of a line exactly once
	let scanlines = AtomicUsize::new(0);
	let channels = SpecificChannels::rgba(|position: Vec2<usize>| {
		if position.x() == 0 {
			scanlines.fetch_add(1, Ordering::Relaxed);
		}
		let pixel = pixels[position.y() * width + position.x()];
		(pixel.r, pixel.g, pixel.b, pixel.a)
	});
	let encoding = Encoding {
		compression,
		blocks: Blocks::ScanLines,
		line_order: LineOrder::Increasing,
	};
	let layer = Layer::new(
		(width, height),
		LayerAttributes::default(),
		encoding,
		channels,
	);
	let image = Image::from_layer(layer);

	let mut writer = Counted::from(writer);
	image.write().non_parallel().to_buffered(&mut writer)?;
	writer.flush().map_err(exr::error::Error::from)?;

	Ok(WriteReport {
		scanlines: scanlines.load(Ordering::Relaxed),
		bytes: writer.end,
	})
}

/// fixed parameters of a benchmark run
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
	/// image width in pixels
	pub width: usize,
	/// image height in pixels
	pub height: usize,
	/// how many times the image is written
	pub iterations: usize,
	/// where every iteration writes to
	pub target: Target,
	/// compression for every iteration
	pub compression: Compression,
}

impl Default for BenchConfig {
	fn default() -> Self {
		Self {
			width: 1980,
			height: 1080,
			iterations: 10,
			target: Target::NullDevice,
			compression: DEFAULT_COMPRESSION,
		}
	}
}

/// allocate a zeroed buffer and write it `config.iterations` times.
///
/// stops at the first failing write.
pub fn run(config: &BenchConfig) -> Result<Vec<WriteReport>> {
	let buffer = PixelBuffer::zeroed(config.width, config.height)?;
	log::info!(
		"writing {}×{} image to {} {} times",
		buffer.width(),
		buffer.height(),
		config.target,
		config.iterations
	);

	let mut reports = Vec::with_capacity(config.iterations);
	for iteration in 0..config.iterations {
		let report = write_image_with_compression(
			&config.target,
			buffer.pixels(),
			buffer.width(),
			buffer.height(),
			config.compression,
		)?;
		log::debug!(
			"iteration {iteration}: {} scanlines, {} bytes",
			report.scanlines,
			report.bytes
		);
		reports.push(report);
	}
	Ok(reports)
}
