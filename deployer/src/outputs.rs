//! Run outputs
//!
//! Outputs land as `key=value` lines, appended to the file named by the
//! invoking environment (the GitHub Actions convention) or printed to
//! stdout when none is given.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::errors::DeployError;
use crate::RunOutputs;

pub fn emit(output_file: Option<&Path>, outputs: &RunOutputs) -> Result<(), DeployError> {
    let pairs = [
        ("anon_key", outputs.anon_key.as_str()),
        ("service_key", outputs.service_key.as_str()),
        ("hostname", outputs.hostname.as_str()),
    ];

    match output_file {
        Some(path) => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            for (key, value) in pairs {
                writeln!(file, "{key}={value}")?;
            }
        }
        None => {
            for (key, value) in pairs {
                println!("{key}={value}");
            }
        }
    }
    Ok(())
}
