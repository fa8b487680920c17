use ::std::path::PathBuf;

use ::clap::Parser;
use ::pai_boot::BootstrapRunner;
use ::pai_common::{error::Result, tracing::info, tracing_subscriber};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Run the bootstrap steps of a job container.
struct Args {
    /// path to the JSON file listing the steps
    #[arg(long)]
    steps_path: PathBuf,
}

fn main() -> Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let Args { steps_path } = Args::parse();
    info!("Start bootstrap from {}", steps_path.display());
    BootstrapRunner::with_builtin_actions().run_file(&steps_path)
}
