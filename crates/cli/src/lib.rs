mod generate;
mod scopes;

use aries_runtime::AriesConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aries",
    version,
    about = "Proxy generation and scope inspection for OSGi class files",
    long_about = "Generates interception proxies for compiled Java classes, either as \
                  subclasses or by weaving the class itself, and inspects persisted \
                  scope isolation state."
)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the parsed structure of a class and the methods a proxy would override
    Inspect {
        /// Class name, dotted or internal form
        #[arg(value_name = "CLASS")]
        class: String,
        /// Directories and jars to load classes from
        #[arg(short = 'c', long = "class-path", required = true, value_name = "PATH")]
        class_path: Vec<PathBuf>,
    },
    /// Generate a subclass proxy for a class
    #[command(
        long_about = "Builds a subclass that overrides every reachable method and routes it \
                            through an InvocationHandler. Prints a JSON summary, and writes the \
                            class file when --output is given."
    )]
    Proxy {
        #[arg(value_name = "CLASS")]
        class: String,
        #[arg(short = 'c', long = "class-path", required = true, value_name = "PATH")]
        class_path: Vec<PathBuf>,
        /// Where to write the generated class file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Weave proxy dispatch into a class
    #[command(
        long_about = "Rewrites the class so each method can be redirected to a dispatcher \
                            and reported to an InvocationListener. Classes that need no weaving \
                            are reported unchanged."
    )]
    Weave {
        #[arg(value_name = "CLASS")]
        class: String,
        #[arg(short = 'c', long = "class-path", required = true, value_name = "PATH")]
        class_path: Vec<PathBuf>,
        /// Where to write the woven class file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the persisted scope tree
    Scopes {
        /// Scope data directory. Defaults to the configured one.
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = aries_runtime::init_logging("cli", true);
    let config = AriesConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { class, class_path } => generate::inspect(&config, &class, &class_path),
        Commands::Proxy {
            class,
            class_path,
            output,
        } => generate::proxy(&config, &class, &class_path, output),
        Commands::Weave {
            class,
            class_path,
            output,
        } => generate::weave(&config, &class, &class_path, output),
        Commands::Scopes { data_dir } => {
            scopes::run(&data_dir.unwrap_or_else(|| config.data_dir.clone()))
        }
    }
}
