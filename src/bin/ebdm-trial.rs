//! ebdm-trial: plays one experimental condition against a running server.
//!
//! ```text
//! ebdm-trial dmade-ep --trial 3 --seed 42
//! ```

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use ebdm_trial_server::client::TrialStreamer;
use ebdm_trial_server::domain::DEFAULT_PROTO;
use ebdm_trial_server::scenario::{Condition, TrialScript, run_script};

/// Stream one scripted trial to the trial server.
#[derive(Clone, Debug, Parser)]
struct Options {
    /// Condition to play.
    #[clap(value_enum)]
    condition: Condition,

    /// Trial route of the server.
    #[clap(
        short,
        long,
        env = "EBDM_TRIAL_URI",
        default_value = "ws://127.0.0.1:8765/trials"
    )]
    uri: String,

    /// Protocol version stamped on every frame.
    #[clap(long, default_value = DEFAULT_PROTO)]
    proto: String,

    /// Trial number.
    #[clap(short, long, default_value = "1")]
    trial: i64,

    /// Seed for the preparation durations; random when omitted.
    #[clap(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opt = Options::parse();
    let mut rng = match opt.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let script = TrialScript::build(opt.condition, &mut rng);
    tracing::info!(
        condition = %opt.condition,
        events = ?script.events(),
        "script ready"
    );

    let mut streamer = TrialStreamer::connect(&opt.uri, &opt.proto).await?;
    run_script(&streamer, &script, opt.trial).await;
    streamer.close().await;

    Ok(())
}
