//! about:memory report collection
//!
//! Signals the running b2g process on a device to dump its memory reports,
//! pulls them into a local directory, and merges them into one file that
//! desktop Firefox can open from about:memory. Every device interaction goes
//! through `adb`.

use super::{capture_checked, Invocation, Launcher};
use crate::error::{B2gError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ADB: &str = "adb";

/// Where gecko writes its reports on the device.
pub const DEVICE_REPORT_DIR: &str = "/data/local/tmp";

pub const MERGED_REPORT: &str = "merged-reports.gz";

const REPORT_PREFIX: &str = "memory-report-";
const OUTPUT_DIR_PREFIX: &str = "about-memory-";
const MAX_OUTPUT_DIRS: usize = 1024;

/// Device tools whose output is saved next to the reports.
const PROCESS_LISTINGS: &[&str] = &["procrank", "b2g-ps", "b2g-procrank"];

const WAKE_HINT: &str = "The device may be asleep and not responding to our signal.\n\
Try pressing a button on the device to wake it up.\n";

static MASTER_PROCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/b2g\s*$").expect("valid regex"));

static CHILD_PROCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/plugin-container\s*$").expect("valid regex"));

#[derive(Debug, Clone, Default)]
pub struct MemoryOptions {
    /// Send `SIGRT1` so gecko minimizes memory usage before dumping.
    pub minimize_memory_usage: bool,
    /// Defaults to the first free `about-memory-N` directory.
    pub output_directory: Option<PathBuf>,
    pub remove_from_device: bool,
    pub poll: PollSettings,
}

/// How long to wait for the device to finish writing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub attempts: u32,
    /// Attempts without a single report before the wake-up hint is shown.
    pub warn_after: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval: Duration::from_millis(250), attempts: 120, warn_after: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeckoProcesses {
    pub master: u32,
    pub children: Vec<u32>,
}

impl GeckoProcesses {
    /// Every gecko process writes one report.
    pub fn expected_reports(&self) -> usize {
        1 + self.children.len()
    }
}

/// Find the b2g master and its plugin-container children in `ps` output.
pub fn parse_processes(ps: &str) -> Result<GeckoProcesses> {
    let mut master = None;
    let mut children = Vec::new();

    for line in ps.lines() {
        let is_master = MASTER_PROCESS.is_match(line);
        if !is_master && !CHILD_PROCESS.is_match(line) {
            continue;
        }
        let Some(pid) = line.split_whitespace().nth(1).and_then(|f| f.parse::<u32>().ok())
        else {
            tracing::warn!("Skipping ps line without a pid: {}", line.trim());
            continue;
        };
        if !is_master {
            children.push(pid);
        } else if master.replace(pid).is_some() {
            return Err(B2gError::Device("Two copies of b2g process found?".to_string()));
        }
    }

    let master = master.ok_or_else(|| {
        B2gError::Device("b2g does not appear to be running on the device.".to_string())
    })?;
    Ok(GeckoProcesses { master, children })
}

/// Absolute device paths of the memory reports in a `ls` listing.
pub fn parse_report_listing(ls: &str) -> BTreeSet<String> {
    ls.lines()
        .map(str::trim)
        .filter(|name| name.starts_with(REPORT_PREFIX))
        .map(|name| format!("{DEVICE_REPORT_DIR}/{name}"))
        .collect()
}

/// `SIGRT0` dumps reports; `SIGRT1` minimizes memory usage first.
pub fn dump_signal(minimize_memory_usage: bool) -> &'static str {
    if minimize_memory_usage {
        "SIGRT1"
    } else {
        "SIGRT0"
    }
}

/// The explicit directory (created if needed, relative to `parent`), or the
/// first `about-memory-N` under `parent` that does not exist yet.
pub fn choose_output_dir(explicit: Option<&Path>, parent: &Path) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let dir = parent.join(dir);
        fs::create_dir_all(&dir)
            .map_err(|source| B2gError::ReportIo { path: dir.clone(), source })?;
        return Ok(dir);
    }

    for n in 0..MAX_OUTPUT_DIRS {
        let dir = parent.join(format!("{OUTPUT_DIR_PREFIX}{n}"));
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(B2gError::ReportIo { path: dir, source }),
        }
    }
    Err(B2gError::ReportIo {
        path: parent.join(format!("{OUTPUT_DIR_PREFIX}N")),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "no free output directory"),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(PathBuf),
    /// The dumps disagree on their shape; the individual files are kept.
    Skipped(String),
}

/// Concatenate the `reports` of every dump in `dir` into [`MERGED_REPORT`].
///
/// All other properties must be present in every dump. Differing values are
/// logged and the first dump's value wins.
pub fn merge_reports(dir: &Path, files: &[String]) -> Result<MergeOutcome> {
    let mut dumps = files.iter().map(|name| read_dump(&dir.join(name)));
    let Some(first) = dumps.next() else {
        return Ok(MergeOutcome::Skipped("there are no dumps".to_string()));
    };
    let mut merged = first?;

    for dump in dumps {
        let dump = dump?;
        let merged_keys: BTreeSet<&String> = merged.keys().collect();
        let dump_keys: BTreeSet<&String> = dump.keys().collect();
        if merged_keys != dump_keys {
            return Ok(MergeOutcome::Skipped(
                "they don't have the same set of properties".to_string(),
            ));
        }
        for (prop, value) in &merged {
            if prop != "reports" && dump.get(prop) != Some(value) {
                tracing::warn!("Dumps have different values for property '{}'", prop);
            }
        }

        let Some(Value::Array(reports)) = dump.get("reports").cloned() else {
            return Ok(MergeOutcome::Skipped("a dump has no reports list".to_string()));
        };
        match merged.get_mut("reports") {
            Some(Value::Array(all)) => all.extend(reports),
            _ => return Ok(MergeOutcome::Skipped("a dump has no reports list".to_string())),
        }
    }

    let path = dir.join(MERGED_REPORT);
    write_dump(&path, &merged)?;
    Ok(MergeOutcome::Merged(path))
}

fn read_dump(path: &Path) -> Result<Map<String, Value>> {
    let file = File::open(path)
        .map_err(|source| B2gError::ReportIo { path: path.to_path_buf(), source })?;
    serde_json::from_reader(GzDecoder::new(BufReader::new(file)))
        .map_err(|source| B2gError::ReportFormat { path: path.to_path_buf(), source })
}

fn write_dump(path: &Path, dump: &Map<String, Value>) -> Result<()> {
    let io_err = |source| B2gError::ReportIo { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(io_err)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer_pretty(&mut encoder, dump)
        .map_err(|source| B2gError::ReportFormat { path: path.to_path_buf(), source })?;
    encoder.finish().and_then(|mut w| w.flush()).map_err(io_err)?;
    Ok(())
}

/// `adb` commands against the attached device.
struct Device<'a, L: ?Sized> {
    launcher: &'a L,
    cwd: &'a Path,
}

impl<L: Launcher + ?Sized> Device<'_, L> {
    fn shell(&self, args: &[&str]) -> Result<String> {
        let invocation = Invocation::new(ADB, self.cwd).arg("shell").args(args.iter().copied());
        capture_checked(self.launcher, &invocation)
    }

    fn report_files(&self) -> Result<BTreeSet<String>> {
        Ok(parse_report_listing(&self.shell(&["ls", DEVICE_REPORT_DIR])?))
    }

    fn pull(&self, remote: &str, into: &Path) -> Result<()> {
        let invocation = Invocation::new(ADB, into).args(["pull", remote]);
        capture_checked(self.launcher, &invocation)?;
        Ok(())
    }
}

fn wait_for_reports<L, W>(
    device: &Device<'_, L>,
    expected: usize,
    old: &BTreeSet<String>,
    poll: &PollSettings,
    out: &mut W,
) -> Result<BTreeSet<String>>
where
    L: Launcher + ?Sized,
    W: Write,
{
    let mut warned = false;
    let mut found = BTreeSet::new();

    for attempt in 0..poll.attempts.max(1) {
        found = device.report_files()?.difference(old).cloned().collect();
        write!(out, "\rGot {}/{} files.", found.len(), expected)?;
        out.flush()?;

        if found.len() >= expected {
            writeln!(out)?;
            return Ok(found);
        }
        if !warned && found.is_empty() && attempt >= poll.warn_after {
            warned = true;
            write!(out, "\r{WAKE_HINT}")?;
        }
        std::thread::sleep(poll.interval);
    }

    writeln!(out)?;
    writeln!(out, "The only about:memory dumps we see are")?;
    for file in &found {
        writeln!(out, "  {file}")?;
    }
    Err(B2gError::Device(format!(
        "Missing some about:memory dumps: expected {} but see only {}",
        expected,
        found.len()
    )))
}

/// Dump, pull, and merge memory reports from every gecko process on the
/// device. Returns the directory holding them.
pub fn collect_reports<L, W>(
    launcher: &L,
    cwd: &Path,
    options: &MemoryOptions,
    out: &mut W,
) -> Result<PathBuf>
where
    L: Launcher + ?Sized,
    W: Write,
{
    let device = Device { launcher, cwd };

    let processes = parse_processes(&device.shell(&["ps"])?)?;
    tracing::debug!("b2g is pid {} with children {:?}", processes.master, processes.children);

    let old = device.report_files()?;
    let signal = dump_signal(options.minimize_memory_usage);
    device.shell(&["killer", signal, &processes.master.to_string()])?;

    let new_files =
        wait_for_reports(&device, processes.expected_reports(), &old, &options.poll, out)?;

    let dir = choose_output_dir(options.output_directory.as_deref(), cwd)?;
    for remote in &new_files {
        device.pull(remote, &dir)?;
    }
    writeln!(out, "Pulled files into {}.", dir.display())?;

    let names: Vec<String> = new_files
        .iter()
        .filter_map(|remote| remote.rsplit('/').next())
        .map(str::to_string)
        .collect();
    match merge_reports(&dir, &names)? {
        MergeOutcome::Merged(path) => tracing::info!("Merged reports into {}", path.display()),
        MergeOutcome::Skipped(reason) => writeln!(out, "Can't merge dumps because {reason}.")?,
    }

    if options.remove_from_device {
        let mut rm = vec!["rm"];
        rm.extend(new_files.iter().map(String::as_str));
        device.shell(&rm)?;
    }

    for tool in PROCESS_LISTINGS {
        let listing = device.shell(&[*tool])?;
        let path = dir.join(tool);
        fs::write(&path, listing).map_err(|source| B2gError::ReportIo { path, source })?;
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingLauncher;
    use serde_json::json;
    use tempfile::TempDir;

    const PS: &str = "\
USER     PID   PPID  VSIZE  RSS     WCHAN    PC         NAME
root      1     0     640    496   c00bd520 00019fb8 S /init
root      100   1     183060 61460 ffffffff 400e3f8c S /system/b2g/b2g\r
app_0     200   100   61284  27544 ffffffff 40051f8c S /system/b2g/plugin-container\r
";

    fn write_gz(path: &Path, value: &Value) {
        let file = File::create(path).expect("create dump");
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer(&mut encoder, value).expect("encode dump");
        encoder.finish().expect("finish dump");
    }

    fn quick_poll() -> PollSettings {
        PollSettings { interval: Duration::ZERO, attempts: 3, warn_after: 1 }
    }

    fn device_launcher() -> RecordingLauncher {
        RecordingLauncher::exiting_with(0)
            .reply("adb shell ps", &[PS])
            .reply(
                "adb shell ls",
                &[
                    "memory-report-old.json.gz\r\n",
                    "memory-report-old.json.gz\r\nmemory-report-100.json.gz\r\n\
                     memory-report-200.json.gz\r\n",
                ],
            )
            .reply("adb shell procrank", &["procrank output\n"])
            .reply("adb shell b2g-ps", &["b2g-ps output\n"])
            .reply("adb shell b2g-procrank", &["b2g-procrank output\n"])
    }

    #[test]
    fn test_parse_processes_finds_master_and_children() {
        let processes = parse_processes(PS).expect("processes");
        assert_eq!(processes, GeckoProcesses { master: 100, children: vec![200] });
        assert_eq!(processes.expected_reports(), 2);
    }

    #[test]
    fn test_parse_processes_requires_running_b2g() {
        let err = parse_processes("root 1 0 640 496 c00bd520 00019fb8 S /init\n")
            .expect_err("should fail");
        assert_eq!(err.to_string(), "b2g does not appear to be running on the device.");
    }

    #[test]
    fn test_parse_processes_rejects_two_masters() {
        let ps = "root 100 1 S /system/b2g/b2g\nroot 101 1 S /system/b2g/b2g\n";
        let err = parse_processes(ps).expect_err("should fail");
        assert_eq!(err.to_string(), "Two copies of b2g process found?");
    }

    #[test]
    fn test_report_listing_ignores_other_files() {
        let files = parse_report_listing("memory-report-1.json.gz\r\nfoo.txt\r\n\r\n");
        let expected: BTreeSet<String> =
            ["/data/local/tmp/memory-report-1.json.gz".to_string()].into_iter().collect();
        assert_eq!(files, expected);
    }

    #[test]
    fn test_dump_signal() {
        assert_eq!(dump_signal(false), "SIGRT0");
        assert_eq!(dump_signal(true), "SIGRT1");
    }

    #[test]
    fn test_output_dir_skips_taken_names() {
        let tmp = TempDir::new().expect("tmp");
        fs::create_dir(tmp.path().join("about-memory-0")).expect("mkdir");
        let dir = choose_output_dir(None, tmp.path()).expect("dir");
        assert_eq!(dir, tmp.path().join("about-memory-1"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_merge_concatenates_reports() {
        let tmp = TempDir::new().expect("tmp");
        write_gz(
            &tmp.path().join("a.json.gz"),
            &json!({"version": 1, "hasMozMallocUsableSize": true, "reports": [{"path": "a"}]}),
        );
        write_gz(
            &tmp.path().join("b.json.gz"),
            &json!({"version": 1, "hasMozMallocUsableSize": true, "reports": [{"path": "b"}]}),
        );

        let outcome = merge_reports(tmp.path(), &["a.json.gz".into(), "b.json.gz".into()])
            .expect("merge");
        let path = tmp.path().join(MERGED_REPORT);
        assert_eq!(outcome, MergeOutcome::Merged(path.clone()));

        let merged = read_dump(&path).expect("merged dump");
        assert_eq!(merged["reports"], json!([{"path": "a"}, {"path": "b"}]));
        assert_eq!(merged["version"], json!(1));
    }

    #[test]
    fn test_merge_skips_dumps_with_different_properties() {
        let tmp = TempDir::new().expect("tmp");
        write_gz(&tmp.path().join("a.json.gz"), &json!({"version": 1, "reports": []}));
        write_gz(&tmp.path().join("b.json.gz"), &json!({"reports": []}));

        let outcome = merge_reports(tmp.path(), &["a.json.gz".into(), "b.json.gz".into()])
            .expect("merge");
        assert!(matches!(outcome, MergeOutcome::Skipped(_)));
        assert!(!tmp.path().join(MERGED_REPORT).exists());
    }

    #[test]
    fn test_collect_reports_pulls_merges_and_cleans_up() {
        let tmp = TempDir::new().expect("tmp");
        let out_dir = tmp.path().join("reports");
        fs::create_dir(&out_dir).expect("mkdir");
        for pid in ["100", "200"] {
            write_gz(
                &out_dir.join(format!("memory-report-{pid}.json.gz")),
                &json!({"version": 1, "reports": [{"process": pid}]}),
            );
        }

        let launcher = device_launcher();
        let options = MemoryOptions {
            output_directory: Some(PathBuf::from("reports")),
            remove_from_device: true,
            poll: quick_poll(),
            ..MemoryOptions::default()
        };
        let mut out = Vec::new();
        let dir = collect_reports(&launcher, tmp.path(), &options, &mut out).expect("collect");
        assert_eq!(dir, out_dir);

        let lines = launcher.command_lines();
        assert!(lines.contains(&"adb shell killer SIGRT0 100".to_string()));
        assert!(lines.contains(&"adb pull /data/local/tmp/memory-report-100.json.gz".to_string()));
        assert!(lines.contains(&"adb pull /data/local/tmp/memory-report-200.json.gz".to_string()));
        assert!(lines.contains(
            &"adb shell rm /data/local/tmp/memory-report-100.json.gz \
              /data/local/tmp/memory-report-200.json.gz"
                .to_string()
        ));
        let pull = launcher
            .launched
            .borrow()
            .iter()
            .find(|inv| inv.args.first().map(String::as_str) == Some("pull"))
            .map(|inv| inv.cwd.clone());
        assert_eq!(pull, Some(out_dir.clone()));

        let merged = read_dump(&out_dir.join(MERGED_REPORT)).expect("merged");
        assert_eq!(merged["reports"], json!([{"process": "100"}, {"process": "200"}]));
        assert_eq!(
            fs::read_to_string(out_dir.join("b2g-procrank")).expect("listing"),
            "b2g-procrank output\n"
        );

        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("Got 2/2 files."));
        assert!(printed.contains(&format!("Pulled files into {}.", out_dir.display())));
    }

    #[test]
    fn test_minimize_sends_sigrt1_and_keeps_device_files() {
        let tmp = TempDir::new().expect("tmp");
        let launcher = device_launcher();
        let options = MemoryOptions {
            minimize_memory_usage: true,
            poll: quick_poll(),
            ..MemoryOptions::default()
        };
        let mut out = Vec::<u8>::new();
        // Nothing was really pulled, so merging fails on the missing files.
        let err = collect_reports(&launcher, tmp.path(), &options, &mut out)
            .expect_err("no pulled files");
        assert!(matches!(err, B2gError::ReportIo { .. }));

        let lines = launcher.command_lines();
        assert!(lines.contains(&"adb shell killer SIGRT1 100".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("adb shell rm")));
        assert!(tmp.path().join("about-memory-0").is_dir());
    }

    #[test]
    fn test_missing_reports_time_out_with_wake_hint() {
        let tmp = TempDir::new().expect("tmp");
        let launcher = RecordingLauncher::exiting_with(0)
            .reply("adb shell ps", &[PS])
            .reply("adb shell ls", &["memory-report-old.json.gz\n"]);
        let options = MemoryOptions { poll: quick_poll(), ..MemoryOptions::default() };
        let mut out = Vec::new();

        let err = collect_reports(&launcher, tmp.path(), &options, &mut out)
            .expect_err("should time out");
        assert!(matches!(err, B2gError::Device(ref msg) if msg.contains("expected 2")));

        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("Got 0/2 files."));
        assert!(printed.contains("Try pressing a button on the device"));
        assert!(!launcher.command_lines().iter().any(|line| line.contains("pull")));
    }

    #[test]
    fn test_adb_failure_is_reported() {
        let tmp = TempDir::new().expect("tmp");
        let launcher = RecordingLauncher::exiting_with(1);
        let mut out = Vec::<u8>::new();
        let err = collect_reports(&launcher, tmp.path(), &MemoryOptions::default(), &mut out)
            .expect_err("should fail");
        assert!(matches!(err, B2gError::CommandFailed { status: 1, ref command, .. }
            if command == "adb shell ps"));
    }
}
