//! Interactive command surface: tokenizes lines from stdin and dispatches
//! them to the [`v6fs::Volume`] façade opened on the positional backing file.

use std::io::{self, BufRead, Write};

use clap::Parser;
use log::error;

use v6fs::Volume;

#[derive(Parser)]
#[command(name = "v6fs", about = "A user-space Unix Version 6 file system tool")]
struct Args {
    /// Path to the backing file treated as the raw block device.
    volume: std::path::PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut volume = match Volume::open(&args.volume) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("fatal: could not open {}: {}", args.volume.display(), e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut out = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(&verb) = words.first() else {
            continue;
        };

        match dispatch(&mut volume, verb, &words[1..]) {
            Ok(Control::Continue) => {}
            Ok(Control::Quit) => break,
            Err(e) => eprintln!("error: {}", e),
        }
        let _ = out.flush();
    }
}

enum Control {
    Continue,
    Quit,
}

fn dispatch(volume: &mut Volume, verb: &str, rest: &[&str]) -> v6fs::Result<Control> {
    match (verb, rest) {
        ("initfs", [num_blocks, num_inodes]) => {
            let (num_blocks, num_inodes) = match (num_blocks.parse::<u32>(), num_inodes.parse::<u32>()) {
                (Ok(b), Ok(i)) => (b, i),
                _ => {
                    usage("initfs <numBlocks> <numInodes>");
                    return Ok(Control::Continue);
                }
            };
            volume.initfs(num_blocks, num_inodes)?;
            Ok(Control::Continue)
        }
        ("cpin", [host_path, v6_path]) => {
            volume.cpin(host_path, v6_path)?;
            Ok(Control::Continue)
        }
        ("cpout", [v6_path, host_path]) => {
            volume.cpout(v6_path, host_path)?;
            Ok(Control::Continue)
        }
        ("mkdir", [v6_path]) => {
            volume.mkdir(v6_path)?;
            Ok(Control::Continue)
        }
        ("rm", [v6_path]) => {
            volume.rm(v6_path)?;
            Ok(Control::Continue)
        }
        ("q", []) => {
            volume.quit()?;
            Ok(Control::Quit)
        }
        (verb, _) => {
            usage(&format!("unknown command {:?}", verb));
            Ok(Control::Continue)
        }
    }
}

fn usage(message: &str) {
    error!("{}", message);
    eprintln!(
        "usage: initfs <numBlocks> <numInodes> | cpin <host> <v6> | cpout <v6> <host> | mkdir <v6> | rm <v6> | q"
    );
}
