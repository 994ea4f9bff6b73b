//! Executes operations on a worker thread.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{NoPassword, OperationInfo, OperationResult, OperationStatus, PasswordProvider};
use crate::algorithm::{ArchiveAlgorithm, algorithm_for};
use crate::archive_type::ArchiveType;
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::fs;
use crate::options::AlgorithmOptions;
use crate::pipeline::Pipeline;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::tree::ArchiveEntry;
use crate::{Error, Result};

/// Progress reporter shared by the sequential units of one operation.
#[derive(Clone)]
struct SharedReporter(Arc<Mutex<Box<dyn ProgressReporter>>>);

impl SharedReporter {
    fn with(&self, f: impl FnOnce(&mut dyn ProgressReporter)) {
        if let Ok(mut reporter) = self.0.lock() {
            f(&mut **reporter);
        }
    }
}

impl ProgressReporter for SharedReporter {
    fn on_total(&mut self, total_bytes: u64) {
        self.with(|r| r.on_total(total_bytes));
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        self.with(|r| r.on_progress(event));
    }

    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        self.with(|r| r.on_entry_start(entry_name, size));
    }

    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        self.with(|r| r.on_entry_complete(entry_name, success));
    }

    fn on_warning(&mut self, message: &str) {
        self.with(|r| r.on_warning(message));
    }
}

/// Outcome of one unit (one archive written or read).
struct Unit {
    name: String,
    outcome: Result<Vec<String>>,
}

/// Runs one or more [`OperationInfo`] requests.
///
/// # Example
///
/// ```rust,no_run
/// use arcflow::{ArchiveType, Operation, OperationInfo, OperationStatus};
///
/// let info = OperationInfo::compress(
///     vec!["report.pdf".into(), "data.csv".into()],
///     "/tmp/out",
///     "bundle",
///     ArchiveType::Zip,
/// );
/// let handle = Operation::new(info).start();
/// // handle.cancel() from any thread stops the worker at the next chunk.
/// let result = handle.join();
/// assert_eq!(result.status, OperationStatus::Success);
/// ```
pub struct Operation {
    infos: Vec<OperationInfo>,
    config: EngineConfig,
    cancel: CancellationToken,
    reporter: SharedReporter,
    passwords: Box<dyn PasswordProvider>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("infos", &self.infos)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// Creates an operation for a single request.
    pub fn new(info: OperationInfo) -> Self {
        Self::batch(vec![info])
    }

    /// Creates an operation running several requests in order.
    pub fn batch(infos: Vec<OperationInfo>) -> Self {
        Self {
            infos,
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
            reporter: SharedReporter(Arc::new(Mutex::new(Box::new(NoProgress)))),
            passwords: Box::new(NoPassword),
        }
    }

    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the progress reporter.
    pub fn progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = SharedReporter(Arc::new(Mutex::new(Box::new(reporter))));
        self
    }

    /// Sets the password provider consulted after an encryption failure.
    pub fn password_provider(mut self, provider: impl PasswordProvider + 'static) -> Self {
        self.passwords = Box::new(provider);
        self
    }

    /// Uses an existing cancellation token.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle to this operation's cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Total bytes the operation will read.
    pub fn total_input_bytes(&self) -> u64 {
        self.infos.iter().map(OperationInfo::total_input_bytes).sum()
    }

    /// Returns true if the input is large enough to warn the user up front.
    pub fn may_take_a_while(&self, config: &EngineConfig) -> bool {
        self.total_input_bytes() >= config.long_operation_threshold
    }

    /// Runs the operation on a background thread.
    pub fn start(self) -> OperationHandle {
        let cancel = self.cancel.clone();
        let thread = std::thread::spawn(move || self.run());
        OperationHandle { cancel, thread }
    }

    /// Runs the operation on the current thread.
    pub fn run(mut self) -> OperationResult {
        let started = Instant::now();
        if let Err(e) = self.preflight() {
            log::warn!("Operation rejected: {}", e);
            return OperationResult::failed(e.to_string(), None, started.elapsed());
        }

        let infos = std::mem::take(&mut self.infos);
        let mut units = Vec::new();
        for info in infos {
            if self.cancel.is_cancelled() {
                break;
            }
            match info {
                OperationInfo::Compression {
                    selected_files,
                    destination,
                    archive_name,
                    archive_type,
                    options,
                } => {
                    let destination = destination.unwrap_or_default();
                    self.compress(
                        &selected_files,
                        &destination,
                        &archive_name,
                        archive_type,
                        &options,
                        &mut units,
                    );
                }
                OperationInfo::Decompression {
                    archive,
                    destination,
                    entries,
                    options,
                } => {
                    let destination = destination.unwrap_or_default();
                    let name = fs::base_name(&archive).unwrap_or_else(|_| archive.display().to_string());
                    let outcome =
                        self.decompress(&archive, &destination, entries.as_deref(), options);
                    units.push(Unit { name, outcome });
                }
            }
        }

        self.summarize(units, started)
    }

    fn preflight(&self) -> Result<()> {
        self.config.validate()?;
        for info in &self.infos {
            if info.destination().is_none_or(|d| d.as_os_str().is_empty()) {
                return Err(Error::Configuration(format!(
                    "no destination folder for '{}'",
                    info.display_name()
                )));
            }
        }
        Ok(())
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            &self.config,
            self.cancel.clone(),
            Box::new(self.reporter.clone()),
        )
    }

    fn compress(
        &self,
        files: &[PathBuf],
        destination: &Path,
        archive_name: &str,
        archive_type: ArchiveType,
        options: &AlgorithmOptions,
        units: &mut Vec<Unit>,
    ) {
        let display = format!("{}{}", archive_name, archive_type.extension());
        let algorithm = match self.compression_algorithm(archive_type) {
            Ok(algorithm) => algorithm,
            Err(e) => {
                units.push(Unit {
                    name: display,
                    outcome: Err(e),
                });
                return;
            }
        };

        if archive_type.is_single_file() && files.len() > 1 {
            log::info!(
                "Fanning out {} files into separate {} archives",
                files.len(),
                archive_type
            );
            for file in files {
                if self.cancel.is_cancelled() {
                    break;
                }
                let name = match fs::base_name(file) {
                    Ok(base) => format!("{}{}", base, archive_type.extension()),
                    Err(e) => {
                        units.push(Unit {
                            name: file.display().to_string(),
                            outcome: Err(e),
                        });
                        continue;
                    }
                };
                let outcome = self.compress_unit(
                    algorithm.as_ref(),
                    std::slice::from_ref(file),
                    destination,
                    &name,
                    options,
                );
                units.push(Unit { name, outcome });
            }
            return;
        }

        let outcome = self.compress_unit(algorithm.as_ref(), files, destination, &display, options);
        units.push(Unit {
            name: display,
            outcome,
        });
    }

    fn compression_algorithm(&self, archive_type: ArchiveType) -> Result<Box<dyn ArchiveAlgorithm>> {
        if !archive_type.supports_compression() {
            return Err(Error::unsupported_format(
                archive_type,
                "archives of this type cannot be created",
            ));
        }
        algorithm_for(archive_type)
    }

    fn compress_unit(
        &self,
        algorithm: &dyn ArchiveAlgorithm,
        files: &[PathBuf],
        destination: &Path,
        file_name: &str,
        options: &AlgorithmOptions,
    ) -> Result<Vec<String>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let (archive, file) = fs::create_unique_file(destination, file_name)?;
        drop(file);
        log::info!("Compressing {} files into '{}'", files.len(), archive.display());

        let mut pipeline = self.pipeline();
        match algorithm.compress(files, &archive, &mut pipeline, options) {
            Ok(()) => Ok(vec![fs::base_name(&archive)?]),
            Err(e) => {
                fs::remove_partial(&archive);
                Err(e)
            }
        }
    }

    fn decompress(
        &mut self,
        archive: &Path,
        destination: &Path,
        entries: Option<&[ArchiveEntry]>,
        mut options: AlgorithmOptions,
    ) -> Result<Vec<String>> {
        let algorithm = algorithm_for(ArchiveType::from_path(archive))?;
        log::info!(
            "Extracting '{}' into '{}'",
            archive.display(),
            destination.display()
        );

        let target = match entries {
            None => {
                let stem = ArchiveType::strip_extension(&fs::base_name(archive)?).to_string();
                Target::Folder(fs::create_unique_dir(destination, &stem)?)
            }
            Some(entries) => Target::Subset(entries),
        };

        let mut outcome = self.decompress_once(algorithm.as_ref(), archive, destination, &target, &options);
        if matches!(&outcome, Err(e) if e.is_encryption_error()) {
            let display = fs::base_name(archive).unwrap_or_else(|_| archive.display().to_string());
            match self.passwords.request_password(&display) {
                Some(password) => {
                    log::info!("Retrying '{}' with a supplied password", display);
                    options.password = Some(password);
                    outcome = self.decompress_once(
                        algorithm.as_ref(),
                        archive,
                        destination,
                        &target,
                        &options,
                    );
                }
                None => log::info!("No password supplied for '{}'", display),
            }
        }

        if outcome.is_err() {
            if let Target::Folder(folder) = &target {
                remove_if_empty(folder);
            }
        }
        outcome
    }

    fn decompress_once(
        &self,
        algorithm: &dyn ArchiveAlgorithm,
        archive: &Path,
        destination: &Path,
        target: &Target<'_>,
        options: &AlgorithmOptions,
    ) -> Result<Vec<String>> {
        let mut pipeline = self.pipeline();
        match target {
            Target::Folder(folder) => {
                algorithm.decompress_all(archive, folder, &mut pipeline, options)?;
                Ok(vec![fs::base_name(folder)?])
            }
            Target::Subset(entries) => {
                let names =
                    algorithm.decompress_subset(archive, destination, entries, true, &mut pipeline, options)?;
                let mut created: Vec<String> = names
                    .values()
                    .filter_map(|path| path.strip_prefix(destination).ok())
                    .map(|path| path.to_string_lossy().into_owned())
                    .collect();
                created.sort();
                Ok(created)
            }
        }
    }

    fn summarize(&self, units: Vec<Unit>, started: Instant) -> OperationResult {
        let total = units.len();
        let mut succeeded = 0;
        let mut failures = Vec::new();
        let mut interrupted = self.cancel.is_cancelled();
        let mut archive_names = Vec::new();

        for unit in units {
            match unit.outcome {
                Ok(names) => {
                    succeeded += 1;
                    archive_names.extend(names);
                }
                Err(e) => {
                    interrupted |= e.is_cancelled();
                    failures.push((unit.name, e));
                }
            }
        }

        let status = OperationStatus::classify(succeeded, failures.len(), interrupted);
        let message = match status {
            OperationStatus::Success => format!("Completed {} of {} items", succeeded, total),
            OperationStatus::PartialFail => format!(
                "Completed {} of {} items; {} failed",
                succeeded,
                total,
                failures.len()
            ),
            OperationStatus::Fail => match failures.first() {
                Some((name, e)) if failures.len() == 1 => format!("Failed to process '{}': {}", name, e),
                _ => format!("All {} items failed", total),
            },
            OperationStatus::Interrupt => "Operation cancelled".to_string(),
        };
        let verbose_message = if failures.is_empty() {
            None
        } else {
            Some(
                failures
                    .iter()
                    .map(|(name, e)| format!("{}: {:?}", name, e))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        };

        let elapsed = started.elapsed();
        log::info!(
            "Operation finished: {} ({}) in {:?}",
            status,
            message,
            elapsed
        );
        OperationResult {
            status,
            message,
            verbose_message,
            elapsed,
            archive_names,
        }
    }
}

/// Where a decompression writes.
enum Target<'a> {
    /// Whole archive into a fresh folder.
    Folder(PathBuf),
    /// Selected entries into the destination itself.
    Subset(&'a [ArchiveEntry]),
}

fn remove_if_empty(folder: &Path) {
    let empty = std::fs::read_dir(folder)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if empty {
        if let Err(e) = std::fs::remove_dir(folder) {
            log::warn!("Failed to remove empty folder '{}': {}", folder.display(), e);
        }
    }
}

/// Handle to an operation running on a background thread.
#[derive(Debug)]
pub struct OperationHandle {
    cancel: CancellationToken,
    thread: JoinHandle<OperationResult>,
}

impl OperationHandle {
    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The operation's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker and returns its result.
    pub fn join(self) -> OperationResult {
        self.thread.join().unwrap_or_else(|_| {
            OperationResult::failed("Operation worker panicked", None, Duration::ZERO)
        })
    }
}
