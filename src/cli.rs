//! Command-line argument parsing for workdays

use crate::calculator::BusinessRequest;
use crate::query::{parse_count, parse_utc_instant, RequestError};

/// Parse command line arguments
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub validate: bool,
    pub help: bool,
    pub days: Option<String>,
    pub hours: Option<String>,
    pub date: Option<String>,
}

impl Args {
    /// One-shot mode runs a single calculation instead of the server
    pub fn is_one_shot(&self) -> bool {
        self.days.is_some() || self.hours.is_some() || self.date.is_some()
    }

    /// Validate the one-shot values with the same rules as the HTTP query
    pub fn request(&self) -> Result<BusinessRequest, RequestError> {
        if self.days.is_none() && self.hours.is_none() {
            return Err(RequestError::MissingCounts);
        }

        Ok(BusinessRequest {
            start: self.date.as_deref().map(parse_utc_instant).transpose()?,
            days: self.days.as_deref().map(|v| parse_count("days", v)).transpose()?,
            hours: self.hours.as_deref().map(|v| parse_count("hours", v)).transpose()?,
        })
    }
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_internal(&args)
}

/// Parse an argv-style slice; the first element is the program name
pub fn parse_args_internal(args: &[String]) -> Args {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            flag @ ("--days" | "--hours" | "--date") => {
                // A flag without a value is kept as empty so validation reports it
                let value = if i + 1 < args.len() {
                    i += 1;
                    args[i].clone()
                } else {
                    String::new()
                };
                match flag {
                    "--days" => result.days = Some(value),
                    "--hours" => result.hours = Some(value),
                    _ => result.date = Some(value),
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("workdays - business-time calculator\n");
    println!("USAGE:");
    println!("    workdays [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --days N                Add N working days and print the result");
    println!("    --hours N               Add N working hours and print the result");
    println!("    --date ISO              Start instant in UTC with Z suffix (default: now)");
    println!("    --validate              Validate configuration and exit");
    println!("    --help, -h              Show this help message\n");
    println!("Without --days/--hours the HTTP server is started (GET /calculate).\n");
    println!("ENVIRONMENT:");
    println!("    PORT, BIND_ADDR, HOLIDAYS_URL, HOLIDAY_CACHE_TTL_SECS,");
    println!("    HOLIDAY_FETCH_TIMEOUT_SECS, HOLIDAY_REFRESH_INTERVAL_SECS");
}
