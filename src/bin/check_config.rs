//! Loads and validates an arm config, then prints the waypoint table it resolves to.

use std::path::PathBuf;

use clap::Parser;

use colorsort_arm::config::ArmConfig;
use colorsort_arm::pose::{Joint, Waypoint};

#[derive(Parser, Debug)]
#[clap(name = "check_config")]
struct Opts {
    /// Config to check. Checks the built-in defaults when omitted.
    config: Option<PathBuf>,

    /// Print the built-in defaults as JSON and exit, handy as a starting point.
    #[clap(long)]
    dump_default: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    if opts.dump_default {
        println!("{}", serde_json::to_string_pretty(&ArmConfig::default())?);
        return Ok(());
    }

    let config = match &opts.config {
        Some(path) => ArmConfig::from_path(path)?,
        None => ArmConfig::default(),
    };
    let table = config.validate()?;

    print!("{:<12}", "waypoint");
    for joint in Joint::ALL {
        print!("{:>10}", joint.to_string());
    }
    println!();
    for waypoint in Waypoint::ALL {
        print!("{:<12}", format!("{waypoint:?}"));
        for (_, value) in table.get(waypoint).targets() {
            print!("{value:>10}");
        }
        println!();
    }
    println!(
        "step {}us, gripper open {}us / closed {}us",
        config.step_us,
        config.gripper.open_us,
        config.gripper.closed_us);
    Ok(())
}
