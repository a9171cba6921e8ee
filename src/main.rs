mod config;
mod exporters;
mod logging;
mod measure;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;

use crate::{
    config::{Args, Config},
    exporters::influx::Influx,
    measure::speedtest_cli::SpeedTestCli,
    pipeline::Pipeline,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = Config::load(&args);

    if let Err(e) = logging::init(&config.log) {
        eprintln!("failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    config.trace_resolved();

    let pipeline = Pipeline::new(
        Box::new(SpeedTestCli::default()),
        Box::new(Influx::new(config.influx)),
    );
    pipeline.run().await.into()
}
