//! Streaming pipeline shared by every algorithm.
//!
//! A [`Pipeline`] carries the per-call state every container format needs:
//! the cancellation token, the progress batcher and its reporter, and the
//! streaming buffer. Algorithms never copy bytes themselves; they go through
//! [`Pipeline::copy`] (engine-driven loops) or [`Pipeline::observe`]
//! (library-driven loops such as `tar::Builder::append_data`), so that every
//! chunk boundary is a cancellation check point and a progress tick.
//!
//! Layering for the TAR family is expressed by [`Compressor`]: the raw file
//! stream is wrapped in an optional gzip/bzip2/LZMA stream, which in turn is
//! wrapped by the TAR reader or writer.

use std::io::{self, Read, Write};

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use lzma_rust2::{LzmaOptions, LzmaReader, LzmaWriter};

use crate::archive_type::ArchiveType;
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::progress::{NoProgress, ProgressBatcher, ProgressReporter};

/// Per-call streaming state: cancellation, progress batching and buffer.
pub struct Pipeline {
    cancel: CancellationToken,
    batcher: ProgressBatcher,
    reporter: Box<dyn ProgressReporter>,
    buffer: Vec<u8>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("batcher", &self.batcher)
            .field("buffer_size", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline for one algorithm call.
    pub fn new(
        config: &EngineConfig,
        cancel: CancellationToken,
        reporter: Box<dyn ProgressReporter>,
    ) -> Self {
        Self {
            cancel,
            batcher: ProgressBatcher::new(config.progress_delay_rate),
            reporter,
            buffer: vec![0u8; config.effective_buffer_size()],
        }
    }

    /// Creates a pipeline with default configuration, a fresh token and no
    /// progress reporting.
    pub fn detached() -> Self {
        Self::new(
            &EngineConfig::default(),
            CancellationToken::new(),
            Box::new(NoProgress),
        )
    }

    /// The cancellation token observed by this pipeline.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns [`Error::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> crate::Result<()> {
        self.cancel.check()
    }

    /// Cumulative bytes processed so far, including unreported ones.
    pub fn processed(&self) -> u64 {
        self.batcher.processed()
    }

    /// Announces the total payload size.
    pub fn report_total(&mut self, total_bytes: u64) {
        self.reporter.on_total(total_bytes);
    }

    /// Announces the start of an entry.
    pub fn entry_started(&mut self, name: &str, size: u64) {
        log::debug!("Processing '{}' ({} bytes)", name, size);
        self.reporter.on_entry_start(name, size);
    }

    /// Announces the end of an entry.
    pub fn entry_completed(&mut self, name: &str, success: bool) {
        self.reporter.on_entry_complete(name, success);
    }

    /// Forwards a recoverable warning to the log and the reporter.
    pub fn warn(&mut self, message: &str) {
        log::warn!("{}", message);
        self.reporter.on_warning(message);
    }

    /// Records one processed buffer.
    pub fn record(&mut self, bytes: usize) {
        if let Some(event) = self.batcher.record(bytes as u64) {
            self.reporter.on_progress(&event);
        }
    }

    /// Reports any bytes not yet reported.
    pub fn flush(&mut self) {
        if let Some(event) = self.batcher.flush() {
            self.reporter.on_progress(&event);
        }
    }

    /// Runs `f` and flushes pending progress whether it succeeds or fails.
    pub fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> crate::Result<T>,
    ) -> crate::Result<T> {
        let result = f(self);
        self.flush();
        result
    }

    /// Copies `reader` into `writer` chunk by chunk.
    ///
    /// Cancellation is checked before every chunk and surfaces as an
    /// [`io::Error`] carrying the cancellation marker, which
    /// [`Error::from_archive_io`] turns back into [`Error::Cancelled`].
    pub fn copy<R, W>(&mut self, reader: &mut R, writer: &mut W) -> io::Result<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut buffer = std::mem::take(&mut self.buffer);
        let result = self.copy_with(&mut buffer, reader, writer);
        self.buffer = buffer;
        result
    }

    fn copy_with<R, W>(&mut self, buffer: &mut [u8], reader: &mut R, writer: &mut W) -> io::Result<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut copied = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::cancelled_io());
            }
            let n = match reader.read(buffer) {
                Ok(0) => return Ok(copied),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&buffer[..n])?;
            copied += n as u64;
            self.record(n);
        }
    }

    /// Drains `reader` without keeping the data, returning the byte count.
    ///
    /// Progress is not reported; used to size single-file payloads.
    pub fn measure<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<u64> {
        let mut buffer = std::mem::take(&mut self.buffer);
        let mut total = 0u64;
        let result = loop {
            if self.cancel.is_cancelled() {
                break Err(Error::cancelled_io());
            }
            match reader.read(&mut buffer) {
                Ok(0) => break Ok(total),
                Ok(n) => total += n as u64,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        self.buffer = buffer;
        result
    }

    /// Wraps a reader so that every read is a progress tick and a
    /// cancellation check.
    pub fn observe<R: Read>(&mut self, reader: R) -> ObservedReader<'_, R> {
        ObservedReader {
            inner: reader,
            pipeline: self,
        }
    }
}

/// Reader adapter produced by [`Pipeline::observe`].
pub struct ObservedReader<'a, R> {
    inner: R,
    pipeline: &'a mut Pipeline,
}

impl<R: Read> Read for ObservedReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pipeline.cancel.is_cancelled() {
            return Err(Error::cancelled_io());
        }
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.pipeline.record(n);
        }
        Ok(n)
    }
}

/// Default compression level for gzip and bzip2 streams.
const DEFAULT_LEVEL: u32 = 6;

/// Memory limit passed to the LZMA decoder, in KiB.
const LZMA_MEM_LIMIT_KIB: u32 = u32::MAX;

/// Optional compressor stream layered under a TAR container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    /// Plain TAR.
    None,
    /// gzip (TarGz).
    Gzip,
    /// bzip2 (TarBz2).
    Bzip2,
    /// LZMA "alone" stream (TarLz).
    Lzma,
}

impl Compressor {
    /// Returns the compressor for a TAR-family type.
    pub fn for_type(archive_type: ArchiveType) -> Option<Self> {
        match archive_type {
            ArchiveType::Tar => Some(Self::None),
            ArchiveType::TarGz => Some(Self::Gzip),
            ArchiveType::TarBz2 => Some(Self::Bzip2),
            ArchiveType::TarLz => Some(Self::Lzma),
            _ => None,
        }
    }

    /// Wraps `writer` in this compressor's encoder.
    pub fn encoder<W: Write>(self, writer: W, level: Option<u32>) -> io::Result<Encoder<W>> {
        let level = level.unwrap_or(DEFAULT_LEVEL).min(9);
        Ok(match self {
            Self::None => Encoder::Plain(writer),
            Self::Gzip => Encoder::Gzip(GzEncoder::new(writer, flate2::Compression::new(level))),
            Self::Bzip2 => Encoder::Bzip2(BzEncoder::new(
                writer,
                bzip2::Compression::new(level.max(1)),
            )),
            Self::Lzma => {
                let options = LzmaOptions::with_preset(level);
                let lzma = LzmaWriter::new_use_header(writer, &options, None)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                Encoder::Lzma(lzma)
            }
        })
    }

    /// Wraps `reader` in this compressor's decoder.
    pub fn decoder<R: Read>(self, reader: R) -> io::Result<Decoder<R>> {
        Ok(match self {
            Self::None => Decoder::Plain(reader),
            Self::Gzip => Decoder::Gzip(MultiGzDecoder::new(reader)),
            Self::Bzip2 => Decoder::Bzip2(MultiBzDecoder::new(reader)),
            Self::Lzma => {
                let lzma = LzmaReader::new_mem_limit(reader, LZMA_MEM_LIMIT_KIB, None)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                Decoder::Lzma(lzma)
            }
        })
    }
}

/// Encoder side of a [`Compressor`].
pub enum Encoder<W: Write> {
    /// Pass-through.
    Plain(W),
    /// gzip encoder.
    Gzip(GzEncoder<W>),
    /// bzip2 encoder.
    Bzip2(BzEncoder<W>),
    /// LZMA encoder.
    Lzma(LzmaWriter<W>),
}

impl<W: Write> Encoder<W> {
    /// Finishes the compressed stream and returns the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(w) => Ok(w),
            Self::Gzip(e) => e.finish(),
            Self::Bzip2(e) => e.finish(),
            Self::Lzma(e) => e.finish().map_err(|e| io::Error::other(e.to_string())),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(e) => e.write(buf),
            Self::Bzip2(e) => e.write(buf),
            Self::Lzma(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(e) => e.flush(),
            Self::Bzip2(e) => e.flush(),
            Self::Lzma(e) => e.flush(),
        }
    }
}

/// Decoder side of a [`Compressor`].
pub enum Decoder<R: Read> {
    /// Pass-through.
    Plain(R),
    /// gzip decoder (multi-member).
    Gzip(MultiGzDecoder<R>),
    /// bzip2 decoder (multi-stream).
    Bzip2(MultiBzDecoder<R>),
    /// LZMA decoder.
    Lzma(LzmaReader<R>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
            Self::Bzip2(d) => d.read(buf),
            Self::Lzma(d) => d.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_cancel_signal;
    use crate::progress::{AtomicProgress, ProgressEvent};
    use std::sync::{Arc, Mutex};

    fn pipeline_with(delay_rate: u32) -> (Pipeline, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = crate::progress::progress_fn(move |event: &ProgressEvent| {
            sink.lock().unwrap().push(*event);
        });
        let config = EngineConfig::new()
            .buffer_size(4096)
            .progress_delay_rate(delay_rate);
        (
            Pipeline::new(&config, CancellationToken::new(), Box::new(reporter)),
            events,
        )
    }

    #[test]
    fn test_copy_reports_exact_bytes() {
        let data = vec![7u8; 4096 * 10 + 123];
        for rate in [0, 1, 3, 10_000] {
            let (mut pipeline, events) = pipeline_with(rate);
            let mut out = Vec::new();
            let copied = pipeline
                .guarded(|p| p.copy(&mut data.as_slice(), &mut out).map_err(Error::Io))
                .unwrap();
            assert_eq!(copied, data.len() as u64);
            assert_eq!(out, data);
            let sum: u64 = events.lock().unwrap().iter().map(|e| e.bytes_processed).sum();
            assert_eq!(sum, data.len() as u64, "delay rate {}", rate);
        }
    }

    #[test]
    fn test_copy_stops_on_cancel() {
        let (mut pipeline, _) = pipeline_with(1);
        pipeline.cancellation().cancel();
        let mut out = Vec::new();
        let err = pipeline.copy(&mut &b"abc"[..], &mut out).unwrap_err();
        assert!(is_cancel_signal(&err));
        assert!(out.is_empty());
    }

    #[test]
    fn test_guarded_flushes_on_error() {
        let progress = AtomicProgress::shared();
        let config = EngineConfig::new().progress_delay_rate(1000);
        let mut pipeline = Pipeline::new(
            &config,
            CancellationToken::new(),
            Box::new(Arc::clone(&progress)),
        );
        let result: crate::Result<()> = pipeline.guarded(|p| {
            p.record(10);
            p.record(20);
            Err(Error::InvalidArgument("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(progress.processed_bytes(), 30);
    }

    #[test]
    fn test_observed_reader_counts() {
        let (mut pipeline, events) = pipeline_with(0);
        let mut sink = Vec::new();
        io::copy(&mut pipeline.observe(&b"hello world"[..]), &mut sink).unwrap();
        pipeline.flush();
        let sum: u64 = events.lock().unwrap().iter().map(|e| e.bytes_processed).sum();
        assert_eq!(sum, 11);
    }

    #[test]
    fn test_compressor_roundtrip() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(50);
        for compressor in [
            Compressor::None,
            Compressor::Gzip,
            Compressor::Bzip2,
            Compressor::Lzma,
        ] {
            let mut encoder = compressor.encoder(Vec::new(), None).unwrap();
            encoder.write_all(&payload).unwrap();
            let compressed = encoder.finish().unwrap();

            let mut decoded = Vec::new();
            compressor
                .decoder(compressed.as_slice())
                .unwrap()
                .read_to_end(&mut decoded)
                .unwrap();
            assert_eq!(decoded, payload, "{:?}", compressor);
        }
    }

    #[test]
    fn test_compressor_for_type() {
        assert_eq!(Compressor::for_type(ArchiveType::TarLz), Some(Compressor::Lzma));
        assert_eq!(Compressor::for_type(ArchiveType::Zip), None);
    }
}
