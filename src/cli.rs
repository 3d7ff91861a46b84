use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Fabric Bench - bastion-relayed iperf3 campaign orchestrator
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Campaign configuration file (JSON)
    #[clap(short, long)]
    pub config: PathBuf,

    /// Campaign kind to run
    #[clap(short = 'k', long, value_enum, default_value_t = CampaignKind::Steady)]
    pub campaign: CampaignKind,

    /// Root directory for result artifacts (default depends on campaign kind)
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Per-run duration, e.g. "30s", "2m" (default: 30s steady, 120s fault)
    #[clap(short, long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Verbose output
    #[clap(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Available campaign kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CampaignKind {
    /// Single sweep of every stream level over every case
    #[clap(name = "steady")]
    Steady,

    /// Three-phase sweeps around an injected link fault
    #[clap(name = "fault")]
    Fault,
}

impl std::fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignKind::Steady => write!(f, "steady-state"),
            CampaignKind::Fault => write!(f, "fault-tolerance"),
        }
    }
}

impl Args {
    /// Artifact root, defaulting per campaign kind so that steady and fault
    /// results never mix.
    pub fn output_root(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from(match self.campaign {
                CampaignKind::Steady => crate::defaults::STEADY_OUTPUT_DIR,
                CampaignKind::Fault => crate::defaults::FAULT_OUTPUT_DIR,
            }),
        }
    }

    /// Per-run duration, defaulting per campaign kind. Fault campaigns run
    /// longer so the during-phase behavior has time to show.
    pub fn run_duration(&self) -> Duration {
        self.duration.unwrap_or(match self.campaign {
            CampaignKind::Steady => crate::defaults::STEADY_DURATION,
            CampaignKind::Fault => crate::defaults::FAULT_DURATION,
        })
    }
}

/// Parse duration from string (e.g. "30s", "2m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num as u64),
        "s" => Duration::from_secs(num as u64),
        "m" => Duration::from_secs((num * 60.0) as u64),
        "h" => Duration::from_secs((num * 3600.0) as u64),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}
