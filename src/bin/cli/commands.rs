//! Command implementations for the CLI tool.

use std::path::{Path, PathBuf};

use arcflow::{
    AlgorithmOptions, ArchiveEntry, ArchiveTreeItem, ArchiveTreeRoot, ArchiveType,
    CancellationToken, EngineConfig, EntryNameEncoding, Operation, OperationInfo,
    PasswordProvider, TreeBuilder,
};

use crate::OutputFormat;
use crate::exit_codes::{ExitCode, error_to_exit_code, status_to_exit_code};
use crate::output::create_formatter;
use crate::password::{PromptPassword, confirm_password};
use crate::progress::CliProgress;

/// Configuration for the compress command.
pub struct CompressConfig<'a> {
    pub files: &'a [PathBuf],
    pub output_dir: &'a Path,
    pub name: Option<String>,
    pub archive_type: ArchiveType,
    pub level: Option<u32>,
    pub password: Option<String>,
    pub ask_password: bool,
    pub format: OutputFormat,
    pub quiet: bool,
    pub cancel: CancellationToken,
}

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub output_dir: &'a Path,
    pub entries: &'a [String],
    pub flatten: bool,
    pub password: Option<String>,
    pub encoding: EntryNameEncoding,
    pub format: OutputFormat,
    pub quiet: bool,
    pub cancel: CancellationToken,
}

/// Compress command implementation
pub fn compress(config: &CompressConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    let missing: Vec<_> = config.files.iter().filter(|f| !f.is_file()).collect();
    if !missing.is_empty() {
        for path in missing {
            eprintln!("Error: {} is not a file", path.display());
        }
        return ExitCode::BadArgs;
    }

    let password = if config.ask_password {
        match confirm_password() {
            Some(pwd) => Some(pwd),
            None => return ExitCode::BadArgs,
        }
    } else {
        config.password.clone()
    };
    if password.is_some() && config.archive_type != ArchiveType::Zip {
        eprintln!("Error: only ZIP archives can be encrypted");
        return ExitCode::BadArgs;
    }

    let name = match config.name.clone().or_else(|| default_archive_name(config.files)) {
        Some(name) => name,
        None => {
            eprintln!("Error: cannot derive an archive name, use --name");
            return ExitCode::BadArgs;
        }
    };

    let mut options = AlgorithmOptions::new();
    if let Some(level) = config.level {
        options = options.level(level);
    }
    if let Some(pwd) = password {
        options = options.password(pwd);
    }

    let info = OperationInfo::compress(
        config.files.to_vec(),
        config.output_dir,
        name,
        config.archive_type,
    )
    .with_options(options);

    let progress = CliProgress::new(config.quiet);
    let result = Operation::new(info)
        .config(EngineConfig::default())
        .progress(progress.clone())
        .cancellation(config.cancel.clone())
        .run();

    if result.is_success() {
        progress.finish();
    } else {
        progress.finish_with_message(result.status.as_str());
    }
    print!("{}", formatter.format_result(&result));
    status_to_exit_code(result.status)
}

/// Extract command implementation
pub fn extract(config: &ExtractConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    if let Err(e) = std::fs::create_dir_all(config.output_dir) {
        eprintln!("Error creating output directory: {}", e);
        return ExitCode::IoError;
    }

    let mut options = AlgorithmOptions::new()
        .encoding(config.encoding)
        .flatten(config.flatten);
    let mut password = config.password.clone();

    let selected = if config.entries.is_empty() {
        None
    } else {
        let root = match open_tree(config.archive_path, &mut password, config.encoding, &config.cancel) {
            Ok(root) => root,
            Err(code) => return code,
        };
        match select_entries(&root, config.entries) {
            Ok(entries) => Some(entries),
            Err(code) => return code,
        }
    };
    if let Some(pwd) = password {
        options = options.password(pwd);
    }

    let mut info = OperationInfo::decompress(config.archive_path, config.output_dir)
        .with_options(options);
    if let Some(entries) = selected {
        info = info.with_entries(entries);
    }

    let progress = CliProgress::new(config.quiet);
    let result = Operation::new(info)
        .progress(progress.clone())
        .password_provider(PromptPassword)
        .cancellation(config.cancel.clone())
        .run();

    if result.is_success() {
        progress.finish();
    } else {
        progress.finish_with_message(result.status.as_str());
    }
    print!("{}", formatter.format_result(&result));
    status_to_exit_code(result.status)
}

/// List command implementation
pub fn list(
    archive_path: &Path,
    password: Option<String>,
    encoding: EntryNameEncoding,
    format: OutputFormat,
    cancel: CancellationToken,
) -> ExitCode {
    let formatter = create_formatter(format);
    let mut password = password;

    let root = match open_tree(archive_path, &mut password, encoding, &cancel) {
        Ok(root) => root,
        Err(code) => return code,
    };

    print!("{}", formatter.format_list(&root));
    ExitCode::Success
}

/// Types command implementation
pub fn types(format: OutputFormat) -> ExitCode {
    print!("{}", create_formatter(format).format_types());
    ExitCode::Success
}

/// Builds the archive tree, prompting once for a password if needed.
///
/// A password entered at the prompt is stored back into `password`.
fn open_tree(
    path: &Path,
    password: &mut Option<String>,
    encoding: EntryNameEncoding,
    cancel: &CancellationToken,
) -> Result<ArchiveTreeRoot, ExitCode> {
    let build = |password: Option<String>| {
        TreeBuilder::new(path)
            .maybe_password(password)
            .encoding(encoding)
            .cancellation(cancel.clone())
            .build()
    };

    let first = build(password.clone());
    let result = match first {
        Err(e) if e.is_encryption_error() && password.is_none() => {
            let display_name = path.display().to_string();
            match PromptPassword.request_password(&display_name) {
                Some(pwd) => {
                    *password = Some(pwd);
                    build(password.clone())
                }
                None => Err(e),
            }
        }
        other => other,
    };

    result.map_err(|e| {
        eprintln!("Error opening archive: {}", e);
        error_to_exit_code(&e)
    })
}

/// Resolves entry keys given on the command line.
fn select_entries(root: &ArchiveTreeRoot, keys: &[String]) -> Result<Vec<ArchiveEntry>, ExitCode> {
    let mut selected = Vec::with_capacity(keys.len());
    for key in keys {
        let normalized = arcflow::archive_path::normalize_key(key);
        match root.find(&normalized) {
            Some(ArchiveTreeItem::File(entry)) => selected.push(entry.clone()),
            Some(ArchiveTreeItem::Node(node)) => selected.push(node.entry()),
            None => {
                eprintln!("Error: '{}' is not in the archive", key);
                return Err(ExitCode::BadArgs);
            }
        }
    }
    Ok(selected)
}

/// Derives the archive name from the first input file.
fn default_archive_name(files: &[PathBuf]) -> Option<String> {
    let first = files.first()?;
    let name = first.file_name()?.to_string_lossy();
    let stem = match Path::new(name.as_ref()).file_stem() {
        Some(stem) => stem.to_string_lossy().to_string(),
        None => name.to_string(),
    };
    Some(stem)
}
