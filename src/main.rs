use exrbench::{run, BenchConfig};

fn main() {
	simple_logger::init_with_level(log::Level::Info).unwrap();

	let config = BenchConfig::default();
	match run(&config) {
		Ok(reports) => log::info!("wrote {} images", reports.len()),
		Err(e) => {
			log::error!("{e}");
			std::process::exit(1);
		}
	}
}
