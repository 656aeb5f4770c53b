//! yt-dlp backend: metadata via `--dump-single-json`, downloads with
//! line-by-line progress parsing.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use url::Url;

use super::{FetchedMedia, MediaBackend};
use crate::core::config;
use crate::download::cookies::CookieStore;
use crate::download::error::JobError;
use crate::download::models::{MediaInfo, MediaKind, MediaRequest, PlaylistEntry, PlaylistInfo, Resolved};
use crate::download::progress::{Phase, ProgressSink};
use crate::download::ytdlp_errors::{error_summary, extraction_error, fetch_error};

/// Number of stderr lines kept for error classification.
const STDERR_TAIL_LINES: usize = 200;

/// Output template stem inside the job directory.
const OUTPUT_STEM: &str = "download";

/// Progress parsed from one `[download]` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    /// Missing when yt-dlp knows no total and prints a byte count instead
    pub percent: Option<f64>,
    /// Byte count printed directly, only on lines without a percentage
    pub downloaded: Option<u64>,
    pub total_bytes: Option<u64>,
    pub speed_bytes_sec: Option<u64>,
    pub eta_seconds: Option<u64>,
}

impl ProgressLine {
    /// Bytes done, printed by yt-dlp or derived from the percentage and the total.
    pub fn downloaded_bytes(&self) -> Option<u64> {
        self.downloaded.or_else(|| {
            let total = self.total_bytes?;
            let percent = self.percent?;
            Some((total as f64 * (percent / 100.0)).round() as u64)
        })
    }
}

/// Parses progress from yt-dlp output line
///
/// yt-dlp pads sizes to a fixed width, so an estimated total may print as
/// `of ~ 100.23MiB` with the tilde as its own token.
///
/// Examples:
/// - "[download]  45.2% of ~10.00MiB at 500.00KiB/s ETA 00:10"
/// - "[download]  55.0% of ~ 100.23MiB at    2.00MiB/s ETA 00:20 (frag 27/50)"
/// - "[download]    1.23MiB at    2.00MiB/s (00:00:05)"
pub fn parse_progress(line: &str) -> Option<ProgressLine> {
    let rest = line.trim_start().strip_prefix("[download]")?;

    let parts: Vec<&str> = rest.split_whitespace().collect();
    let mut percent = None;
    let mut total_bytes = None;
    let mut speed_bytes_sec = None;
    let mut eta_seconds = None;

    for (i, part) in parts.iter().enumerate() {
        let next = parts.get(i + 1).copied();
        if let Some(value) = part.strip_suffix('%') {
            if let Ok(p) = value.parse::<f64>() {
                percent = Some(p.clamp(0.0, 100.0));
            }
        }
        match (*part, next) {
            ("of", Some("~")) => total_bytes = parts.get(i + 2).and_then(|size| parse_size(size)),
            ("of", Some(size)) => total_bytes = parse_size(size),
            ("at", Some(speed)) => speed_bytes_sec = parse_size(speed),
            ("ETA", Some(eta)) => eta_seconds = parse_eta(eta),
            _ => {}
        }
    }

    let downloaded = match percent {
        Some(_) => None,
        // "[download]   1.23MiB at ..." is only printed while the total is unknown
        None => parts.first().and_then(|size| parse_size(size)),
    };
    if percent.is_none() && downloaded.is_none() {
        return None;
    }

    Some(ProgressLine {
        percent,
        downloaded,
        total_bytes,
        speed_bytes_sec,
        eta_seconds,
    })
}

/// Parses a size such as "10.00MiB", "~1.2GiB" or "500.00KiB/s"
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_start_matches('~').trim_end_matches("/s");
    let units: [(&str, f64); 5] = [
        ("TiB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
        ("B", 1.0),
    ];

    units.iter().find_map(|(suffix, multiplier)| {
        let number = size_str.strip_suffix(suffix)?;
        let value = number.parse::<f64>().ok()?;
        Some((value * multiplier) as u64)
    })
}

/// Parses an ETA such as "00:10" or "1:02:03"
fn parse_eta(eta_str: &str) -> Option<u64> {
    eta_str
        .split(':')
        .try_fold(0u64, |acc, part| part.parse::<u64>().ok().map(|value| acc * 60 + value))
        .filter(|_| eta_str.contains(':'))
}

/// Turns `--dump-single-json` output into a single item or a playlist.
pub fn parse_resolved(json: &str) -> Result<Resolved, JobError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| JobError::Extraction(format!("unreadable metadata: {}", e)))?;

    if let Some(entries) = value.get("entries").and_then(Value::as_array) {
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Playlist")
            .to_string();
        let entries = entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let url = entry
                    .get("webpage_url")
                    .or_else(|| entry.get("url"))
                    .and_then(Value::as_str)?;
                let index = entry
                    .get("playlist_index")
                    .and_then(Value::as_u64)
                    .and_then(|index| usize::try_from(index).ok())
                    .unwrap_or(position + 1);
                Some(PlaylistEntry {
                    index,
                    url: url.to_string(),
                    title: entry
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("Untitled")
                        .to_string(),
                })
            })
            .collect();
        return Ok(Resolved::Playlist(PlaylistInfo { title, entries }));
    }

    let info: MediaInfo =
        serde_json::from_value(value).map_err(|e| JobError::Extraction(format!("unreadable metadata: {}", e)))?;
    Ok(Resolved::Single(info))
}

/// Finds the artifact yt-dlp left in `dir`, ignoring partials and side files.
async fn find_output(dir: &Path) -> Result<PathBuf, JobError> {
    let mut entries = fs_err::tokio::read_dir(dir).await?;
    let mut best: Option<(u64, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_side_file = [".part", ".ytdl", ".temp", ".jpg", ".webp", ".png"]
            .iter()
            .any(|suffix| name.ends_with(suffix));
        if !name.starts_with(OUTPUT_STEM) || is_side_file {
            continue;
        }
        let size = entry.metadata().await?.len();
        match &best {
            Some((best_size, _)) if *best_size >= size => {}
            _ => best = Some((size, path)),
        }
    }

    best.map(|(_, path)| path)
        .ok_or_else(|| JobError::Disk("yt-dlp finished but no output file was found".to_string()))
}

/// yt-dlp driven [`MediaBackend`].
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    bin: String,
    cookies: CookieStore,
    extraction_timeout: Duration,
}

impl YtDlpBackend {
    pub fn new(bin: impl Into<String>, cookies: CookieStore, extraction_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            cookies,
            extraction_timeout,
        }
    }

    pub fn from_config(cookies: CookieStore) -> Self {
        Self::new(config::YTDL_BIN.as_str(), cookies, config::extraction::timeout())
    }

    fn push_cookie_args(&self, args: &mut Vec<String>) {
        if self.cookies.exists() {
            args.push("--cookies".to_string());
            args.push(self.cookies.path().display().to_string());
        }
    }

    fn fetch_args(&self, request: &MediaRequest, dest: &Path) -> Vec<String> {
        let template = dest.join(format!("{}.%(ext)s", OUTPUT_STEM));
        let mut args: Vec<String> = [
            "--newline",
            "--no-playlist",
            "--no-part",
            "--no-mtime",
            "--socket-timeout",
            "30",
            "--fragment-retries",
            "10",
            "-f",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        args.push(request.selector.clone());
        args.push("-o".to_string());
        args.push(template.display().to_string());
        if request.kind == MediaKind::Video {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }
        self.push_cookie_args(&mut args);
        args.push(request.source_url.to_string());
        args
    }
}

/// Feeds one stdout line into the sink.
fn handle_output_line(line: &str, sink: &ProgressSink) {
    let trimmed = line.trim_start();
    if trimmed.starts_with("[Merger]") || trimmed.starts_with("[VideoConvertor]") {
        if sink.phase() != Phase::Merging {
            log::debug!("yt-dlp started merging: {}", trimmed);
            sink.begin_phase(Phase::Merging, None);
        }
        return;
    }

    if trimmed.starts_with("[download] Destination:") {
        // every stream of a multi-stream download restarts the counters
        sink.begin_stream();
        return;
    }

    if let Some(progress) = parse_progress(line) {
        if let Some(downloaded) = progress.downloaded_bytes() {
            sink.report(downloaded, progress.total_bytes);
        } else {
            log::trace!("yt-dlp progress without a byte count: {}", trimmed);
        }
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &Url) -> Result<Resolved, JobError> {
        let mut args: Vec<String> = ["--dump-single-json", "--flat-playlist", "--no-warnings", "--socket-timeout", "30"]
            .iter()
            .map(|arg| arg.to_string())
            .collect();
        self.push_cookie_args(&mut args);
        args.push(url.to_string());

        log::debug!("yt-dlp command for metadata: {} {}", self.bin, args.join(" "));

        let output = match timeout(
            self.extraction_timeout,
            TokioCommand::new(&self.bin).args(&args).kill_on_drop(true).output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::error!("Failed to execute yt-dlp: {}", e);
                return Err(JobError::Extraction(format!("could not run yt-dlp: {}", e)));
            }
            Err(_) => {
                log::warn!("yt-dlp metadata lookup timed out for {}", url);
                return Err(JobError::Extraction(format!(
                    "lookup timed out after {}s",
                    self.extraction_timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("yt-dlp metadata failed for {}: {}", url, error_summary(&stderr));
            return Err(extraction_error(&stderr));
        }

        parse_resolved(&String::from_utf8_lossy(&output.stdout))
    }

    async fn fetch(&self, request: &MediaRequest, dest: &Path, sink: ProgressSink) -> Result<FetchedMedia, JobError> {
        let args = self.fetch_args(request, dest);
        log::info!(
            "Starting yt-dlp download of {} with selector {}",
            request.source_url,
            request.selector
        );
        log::debug!("yt-dlp command: {} {}", self.bin, args.join(" "));

        let mut child = TokioCommand::new(&self.bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                log::error!("Failed to spawn yt-dlp for download: {}", e);
                JobError::Disk(format!("could not run yt-dlp: {}", e))
            })?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("yt-dlp stderr: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::trace!("yt-dlp stdout: {}", line);
                handle_output_line(&line, &sink);
            }
        }

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr_text = Vec::from(stderr_tail).join("\n");
            log::warn!(
                "yt-dlp exited with {} for {}: {}",
                status,
                request.source_url,
                error_summary(&stderr_text)
            );
            return Err(fetch_error(&stderr_text));
        }

        let path = find_output(dest).await?;
        let size = fs_err::tokio::metadata(&path).await?.len();
        log::info!("yt-dlp produced {} ({} bytes)", path.display(), size);
        Ok(FetchedMedia { path, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_progress_full_line() {
        let line = "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10";
        let progress = parse_progress(line).unwrap();
        assert_eq!(progress.percent, Some(45.2));
        assert_eq!(progress.total_bytes, Some(10 * 1024 * 1024));
        assert_eq!(progress.speed_bytes_sec, Some(500 * 1024));
        assert_eq!(progress.eta_seconds, Some(10));
        assert_eq!(progress.downloaded_bytes(), Some(4_739_564));
    }

    #[test]
    fn test_parse_progress_padded_estimated_total() {
        let line = "[download]  55.0% of ~ 100.23MiB at    2.00MiB/s ETA 00:20 (frag 27/50)";
        let progress = parse_progress(line).unwrap();
        assert_eq!(progress.percent, Some(55.0));
        assert_eq!(progress.total_bytes, Some(105_099_345));
        assert_eq!(progress.speed_bytes_sec, Some(2 * 1024 * 1024));
        assert_eq!(progress.eta_seconds, Some(20));
        assert_eq!(progress.downloaded_bytes(), Some(57_804_640));

        let unknowns = parse_progress("[download]   3.0% of ~  1.50GiB at  Unknown B/s ETA Unknown (frag 2/120)").unwrap();
        assert_eq!(unknowns.total_bytes, Some(1_610_612_736));
        assert_eq!(unknowns.speed_bytes_sec, None);
        assert_eq!(unknowns.eta_seconds, None);

        let compact = parse_progress("[download]  10.0% of ~1.50GiB at 2.00MiB/s ETA 1:02:03").unwrap();
        assert_eq!(compact.total_bytes, Some(1_610_612_736));
        assert_eq!(compact.eta_seconds, Some(3723));
    }

    #[test]
    fn test_parse_progress_without_total() {
        let progress = parse_progress("[download]    1.23MiB at    2.00MiB/s (00:00:05)").unwrap();
        assert_eq!(progress.percent, None);
        assert_eq!(progress.total_bytes, None);
        assert_eq!(progress.downloaded_bytes(), Some(1_289_748));
        assert_eq!(progress.speed_bytes_sec, Some(2 * 1024 * 1024));

        // percentage known but the total is not
        let no_size = parse_progress("[download]  12.0% of Unknown B at 1.00KiB/s ETA Unknown").unwrap();
        assert_eq!(no_size.percent, Some(12.0));
        assert_eq!(no_size.downloaded_bytes(), None);
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert_eq!(parse_progress("[download] Destination: /tmp/x/download.mp4"), None);
        assert_eq!(parse_progress("[download] Downloading item 2 of 5"), None);
        assert_eq!(parse_progress("[download] /tmp/x/download.mp4 has already been downloaded"), None);
        assert_eq!(parse_progress("[Merger] Merging formats into \"download.mp4\""), None);
        assert_eq!(parse_progress("[youtube] abc: Downloading 100% webpage"), None);
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("512B"), Some(512));
        assert_eq!(parse_size("1.00KiB/s"), Some(1024));
        assert_eq!(parse_size("Unknown"), None);
    }

    #[test]
    fn test_handle_output_line_switches_to_merging() {
        let sink = ProgressSink::new();
        sink.begin_phase(Phase::Downloading, None);
        handle_output_line("[download]  50.0% of 2.00MiB at 1.00MiB/s ETA 00:01", &sink);
        assert_eq!(sink.snapshot().unwrap().bytes_transferred, 1_048_576);

        handle_output_line("[Merger] Merging formats into \"download.mp4\"", &sink);
        assert_eq!(sink.phase(), Phase::Merging);
    }

    #[test]
    fn test_handle_output_line_reports_fragmented_download() {
        let sink = ProgressSink::new();
        sink.begin_phase(Phase::Downloading, None);
        handle_output_line("[download] Destination: /tmp/yt_dl_x/download.f137.mp4", &sink);
        handle_output_line(
            "[download]  55.0% of ~ 100.23MiB at    2.00MiB/s ETA 00:20 (frag 27/50)",
            &sink,
        );

        let snap = sink.snapshot().unwrap();
        assert_eq!(snap.bytes_transferred, 57_804_640);
        assert_eq!(snap.percent(), Some(55));
    }

    #[test]
    fn test_handle_output_line_shrinking_estimate_keeps_bytes() {
        let sink = ProgressSink::new();
        sink.begin_phase(Phase::Downloading, None);
        handle_output_line("[download] Destination: /tmp/yt_dl_x/download.mp4", &sink);
        handle_output_line("[download]  40.0% of ~ 100.00MiB at    2.00MiB/s ETA 00:30 (frag 20/50)", &sink);
        let before = sink.snapshot().unwrap();

        // the estimate drops, so the derived byte count dips below the last one
        handle_output_line("[download]  41.0% of ~  90.00MiB at    2.00MiB/s ETA 00:27 (frag 21/50)", &sink);
        let after = sink.snapshot().unwrap();

        assert_eq!(after.bytes_transferred, before.bytes_transferred);
        assert_eq!(after.total_bytes, Some(90 * 1024 * 1024));
    }

    #[test]
    fn test_handle_output_line_without_total() {
        let sink = ProgressSink::new();
        sink.begin_phase(Phase::Downloading, None);
        handle_output_line("[download]    1.23MiB at    2.00MiB/s (00:00:05)", &sink);

        let snap = sink.snapshot().unwrap();
        assert_eq!(snap.bytes_transferred, 1_289_748);
        assert_eq!(snap.total_bytes, None);
    }

    #[test]
    fn test_handle_output_line_banks_streams_on_destination() {
        let sink = ProgressSink::new();
        sink.begin_phase(Phase::Downloading, None);
        handle_output_line("[download] Destination: /tmp/yt_dl_x/download.f136.mp4", &sink);
        handle_output_line("[download] 100% of    2.00MiB in 00:00:01 at 2.00MiB/s", &sink);
        handle_output_line("[download] Destination: /tmp/yt_dl_x/download.f140.m4a", &sink);
        handle_output_line("[download]  50.0% of    1.00MiB at 1.00MiB/s ETA 00:01", &sink);

        let snap = sink.snapshot().unwrap();
        assert_eq!(snap.bytes_transferred, 2_621_440);
        assert_eq!(snap.total_bytes, Some(3_145_728));
    }

    #[tokio::test]
    async fn test_fetch_spawn_failure_is_a_server_fault() {
        let backend = YtDlpBackend::new(
            "/nonexistent/clipdrop-yt-dlp",
            CookieStore::new(PathBuf::from("/nonexistent/cookies.txt")),
            Duration::from_secs(5),
        );
        let request = MediaRequest {
            source_url: Url::parse("https://example.com/watch?v=1").unwrap(),
            selector: "18".to_string(),
            kind: MediaKind::Video,
            quality: "360p".to_string(),
            title: "Clip".to_string(),
            thumbnail_url: None,
            estimated_size: None,
            playlist_index: None,
        };
        let dest = tempfile::tempdir().unwrap();

        let err = backend.fetch(&request, dest.path(), ProgressSink::new()).await.unwrap_err();
        assert!(matches!(err, JobError::Disk(_)), "got {:?}", err);
    }

    #[test]
    fn test_parse_resolved_single() {
        let json = r#"{"id":"abc","title":"Clip","duration":12.5,"thumbnail":"https://i/x.jpg",
            "formats":[{"format_id":"18","ext":"mp4","vcodec":"avc1","acodec":"mp4a","height":360,"filesize":1000}]}"#;
        match parse_resolved(json).unwrap() {
            Resolved::Single(info) => {
                assert_eq!(info.title, "Clip");
                assert_eq!(info.formats.len(), 1);
                assert_eq!(info.thumbnail.as_deref(), Some("https://i/x.jpg"));
            }
            other => panic!("expected single item, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_resolved_playlist() {
        let json = r#"{"_type":"playlist","title":"Mix","entries":[
            {"url":"https://www.youtube.com/watch?v=a","title":"A"},
            {"id":"no-url"},
            {"webpage_url":"https://www.youtube.com/watch?v=c"}]}"#;
        match parse_resolved(json).unwrap() {
            Resolved::Playlist(playlist) => {
                assert_eq!(playlist.title, "Mix");
                assert_eq!(
                    playlist.entries,
                    vec![
                        PlaylistEntry {
                            index: 1,
                            url: "https://www.youtube.com/watch?v=a".into(),
                            title: "A".into()
                        },
                        PlaylistEntry {
                            index: 3,
                            url: "https://www.youtube.com/watch?v=c".into(),
                            title: "Untitled".into()
                        },
                    ]
                );
            }
            other => panic!("expected playlist, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_resolved_playlist_index_wins_over_position() {
        let json = r#"{"entries":[{"url":"https://youtu.be/x","title":"X","playlist_index":12}]}"#;
        let Resolved::Playlist(playlist) = parse_resolved(json).unwrap() else {
            panic!("expected playlist");
        };
        assert_eq!(playlist.title, "Playlist");
        assert_eq!(playlist.entries[0].index, 12);
    }

    #[test]
    fn test_parse_resolved_garbage_is_extraction_error() {
        assert!(matches!(parse_resolved("not json"), Err(JobError::Extraction(_))));
    }

    #[test]
    fn test_fetch_args_include_selector_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let backend = YtDlpBackend::new(
            "yt-dlp",
            CookieStore::new(dir.path().join("cookies.txt")),
            Duration::from_secs(30),
        );
        let request = MediaRequest {
            source_url: Url::parse("https://example.com/v").unwrap(),
            selector: "137+bestaudio".into(),
            kind: MediaKind::Video,
            quality: "1080p".into(),
            title: "t".into(),
            thumbnail_url: None,
            estimated_size: None,
            playlist_index: None,
        };
        let args = backend.fetch_args(&request, dir.path());
        let selector_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[selector_pos + 1], "137+bestaudio");
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/v");
    }

    #[tokio::test]
    async fn test_find_output_skips_side_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("download.mp4.part"), vec![0u8; 50]).unwrap();
        std::fs::write(dir.path().join("thumb.jpg"), vec![0u8; 80]).unwrap();
        std::fs::write(dir.path().join("download.mp4"), vec![0u8; 10]).unwrap();

        let found = find_output(dir.path()).await.unwrap();
        assert_eq!(found, dir.path().join("download.mp4"));
    }

    #[tokio::test]
    async fn test_find_output_empty_dir_is_disk_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(find_output(dir.path()).await, Err(JobError::Disk(_))));
    }
}
