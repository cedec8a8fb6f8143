use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources.
const SOURCE_DIRS: [&str; 5] = ["models", "utils", "voxel", "tests", "benches"];

// Collects every matching line of one file so the build error can list them all.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    what: &'static str,
    hint: &'static str,
}

impl ViolationCollector {
    fn new(file_path: &Path, what: &'static str, hint: &'static str) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            what,
            hint,
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.what,
            file_name
        );

        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }

        error_msg.push_str(&format!(
            "\n⚠️ {} are not allowed in this project.\n",
            self.what
        ));
        error_msg.push_str(&format!("   {}\n", self.hint));

        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        // Comments and string literals may mention underscores freely.
        let is_pure_comment = line_text.trim_start().starts_with("//");
        let is_in_string = line_text
            .split('"')
            .enumerate()
            .any(|(i, part)| i % 2 == 1 && part.contains('_'));
        if is_pure_comment || is_in_string {
            return Ok(true);
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let checks = [
        (
            r"\b(_[a-zA-Z0-9_]+)\b",
            "underscore-prefixed variables",
            "Either use the variable (removing the underscore) or remove it completely.",
        ),
        (
            r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
            "#[allow(dead_code)] attributes",
            "Either use the code (removing the attribute) or remove it completely.",
        ),
    ];

    for (pattern, what, hint) in checks {
        if let Err(e) = scan_sources(pattern, what, hint) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn scan_sources(pattern: &str, what: &'static str, hint: &'static str) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();

    for entry in SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
    {
        let path = entry.path();
        let mut collector = ViolationCollector::new(path, what, hint);
        searcher.search_path(&matcher, path, &mut collector)?;

        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }

    Ok(())
}
