//! CLI tool for arcflow archive operations.

mod commands;
mod exit_codes;
mod output;
mod password;
mod progress;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use arcflow::{ArchiveType, CancellationToken, EntryNameEncoding};
use exit_codes::ExitCode;

/// Compress, extract and browse archives
#[derive(Parser)]
#[command(name = "arcflow")]
#[command(author, version, about = "Compress, extract and browse archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress progress output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files into a new archive (alias: a)
    #[command(alias = "a")]
    Compress {
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Folder the archive is created in
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// Archive name without extension (defaults to the first file's name)
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Archive format
        #[arg(short = 't', long = "type", value_enum, default_value = "zip")]
        archive_type: TypeArg,

        /// Compression level (0-9)
        #[arg(short = 'l', long)]
        level: Option<u32>,

        /// Encrypt a ZIP archive with this password
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// Prompt for the encryption password
        #[arg(long, conflicts_with = "password")]
        ask_password: bool,
    },

    /// Extract an archive (alias: x)
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// Entry keys to extract (everything when omitted)
        #[arg(short = 'e', long = "entry")]
        entries: Vec<String>,

        /// Write selected entries directly into the output directory
        #[arg(long)]
        flatten: bool,

        /// Password (will prompt if needed and not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// Entry-name encoding for ZIP archives
        #[arg(long, value_enum, default_value = "utf8")]
        encoding: EncodingArg,
    },

    /// List archive contents as a tree (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Password (will prompt if needed)
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// Entry-name encoding for ZIP archives
        #[arg(long, value_enum, default_value = "utf8")]
        encoding: EncodingArg,
    },

    /// Show supported archive types
    Types,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Zip,
    Tar,
    Gz,
    Bz2,
    TarGz,
    TarBz2,
    TarLz,
}

impl From<TypeArg> for ArchiveType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Zip => ArchiveType::Zip,
            TypeArg::Tar => ArchiveType::Tar,
            TypeArg::Gz => ArchiveType::GZip,
            TypeArg::Bz2 => ArchiveType::BZip2,
            TypeArg::TarGz => ArchiveType::TarGz,
            TypeArg::TarBz2 => ArchiveType::TarBz2,
            TypeArg::TarLz => ArchiveType::TarLz,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    Utf8,
    Cp437,
}

impl From<EncodingArg> for EntryNameEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => EntryNameEncoding::Utf8,
            EncodingArg::Cp437 => EntryNameEncoding::Cp437,
        }
    }
}

fn main() {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(exit_codes::USER_INTERRUPT);
        }
        eprintln!("\nInterrupted, stopping...");
        handler_token.cancel();
    })
    .ok();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Compress {
            files,
            output,
            name,
            archive_type,
            level,
            password,
            ask_password,
        } => commands::compress(&commands::CompressConfig {
            files: &files,
            output_dir: &output,
            name,
            archive_type: archive_type.into(),
            level,
            password,
            ask_password,
            format: cli.format,
            quiet: cli.quiet,
            cancel,
        }),

        Commands::Extract {
            archive,
            output,
            entries,
            flatten,
            password,
            encoding,
        } => commands::extract(&commands::ExtractConfig {
            archive_path: &archive,
            output_dir: &output,
            entries: &entries,
            flatten,
            password,
            encoding: encoding.into(),
            format: cli.format,
            quiet: cli.quiet,
            cancel,
        }),

        Commands::List {
            archive,
            password,
            encoding,
        } => commands::list(&archive, password, encoding.into(), cli.format, cancel),

        Commands::Types => commands::types(cli.format),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    std::process::exit(exit_code.code());
}
