use clap::{Parser as ClapParser, Subcommand};
use sprig_lang::cli::{self, CliError, RenderOptions};
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "sprig")]
#[command(about = "Sprig - a Jinja-style template language: render, format, and check templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template against a JSON context
    Render {
        /// Path to the template file
        template: PathBuf,

        /// JSON context (reads from stdin if not provided)
        #[arg(short, long)]
        context: Option<String>,

        /// Remove the newline after block tags
        #[arg(long)]
        trim_blocks: bool,

        /// Strip leading whitespace before block tags
        #[arg(long)]
        lstrip_blocks: bool,
    },

    /// Reformat a template to canonical source
    Fmt {
        /// Path to the template file
        template: PathBuf,

        /// Indent width for nested blocks
        #[arg(short, long, default_value_t = 4)]
        indent: usize,
    },

    /// Validate template syntax without rendering
    Check {
        /// Path to the template file
        template: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            template,
            context,
            trim_blocks,
            lstrip_blocks,
        } => run_render(template, context, trim_blocks, lstrip_blocks),
        Commands::Fmt { template, indent } => run_fmt(template, indent),
        Commands::Check { template } => run_check(template),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_render(
    template: PathBuf,
    context: Option<String>,
    trim_blocks: bool,
    lstrip_blocks: bool,
) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&template).map_err(CliError::Io)?;

    let context = match context {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = RenderOptions {
        source,
        context,
        trim_blocks,
        lstrip_blocks,
    };

    let output = cli::execute_render(&options)?;
    println!("{}", output);
    Ok(())
}

fn run_fmt(template: PathBuf, indent: usize) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&template).map_err(CliError::Io)?;
    let formatted = cli::execute_fmt(&source, indent)?;
    println!("{}", formatted);
    Ok(())
}

fn run_check(template: PathBuf) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&template).map_err(CliError::Io)?;
    cli::execute_check(&source)?;
    println!("Syntax is valid");
    Ok(())
}
