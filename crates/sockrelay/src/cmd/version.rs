use sockrelay_frame::{ClientProfile, DEFAULT_MAX_RETRANSMITS, FRAME_CAPACITY};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("sockrelay {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: sockrelay");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SOCKRELAY_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("frame_capacity: {FRAME_CAPACITY}");
    println!("max_retransmits: {DEFAULT_MAX_RETRANSMITS}");
    let profiles: Vec<String> = ClientProfile::ALL.iter().map(ToString::to_string).collect();
    println!("profiles: {}", profiles.join(", "));

    Ok(SUCCESS)
}
