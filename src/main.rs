use colored::Colorize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use structopt::StructOpt;

use gps_rcv::config::Config;
use gps_rcv::constants::SAMPLES_PER_MSEC;
use gps_rcv::receiver::Receiver;
use gps_rcv::recording::{IQRecording, SampleFormat};
use gps_rcv::state::ReceiverState;

#[derive(StructOpt)]
#[structopt(name = "gps-rcv", about = "software-defined GPS receiver")]
struct Options {
    #[structopt(short = "f", long, default_value = "resources/nov_3_time_18_48_st_ives")]
    file: PathBuf,
    #[structopt(short = "t", long, default_value = "f32", help = "IQ sample format: f32, i16, i8, rtlsdr")]
    format: SampleFormat,
    #[structopt(long, default_value = "0")]
    off_msec: usize,
    #[structopt(long, default_value = "0", help = "stop after n milliseconds, 0 means run to exhaustion")]
    num_msec: usize,
    #[structopt(long, default_value = "", help = "comma-separated PRN subset")]
    sats: String,
    #[structopt(long, short = "v")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let opt = Options::from_args();

    env_logger::Builder::from_default_env()
        .filter_level(if opt.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_timestamp_millis()
        .init();

    println!(
        "gps-rcv: {} -- {} off_msec={}",
        opt.file.display().to_string().green(),
        opt.format,
        opt.off_msec,
    );

    let exit_req = Arc::new(AtomicBool::new(false));
    let exit_req_ctrlc = exit_req.clone();
    ctrlc::set_handler(move || exit_req_ctrlc.store(true, Ordering::SeqCst)).unwrap();

    let recording = IQRecording::new(&opt.file, opt.format, opt.off_msec * SAMPLES_PER_MSEC)?;

    let state = Arc::new(Mutex::new(ReceiverState::default()));
    let mut receiver = Receiver::new(
        Box::new(recording),
        &opt.sats,
        Config::default(),
        exit_req,
        state,
    );
    receiver.run_loop(opt.num_msec);

    Ok(())
}
