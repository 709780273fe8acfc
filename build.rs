use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[path = "build/policy.rs"]
mod policy;

// Source roots that belong to this crate. Anything else under the manifest
// directory (build output, vendored reference material) is not policed.
const SOURCE_ROOTS: [&str; 4] = ["pool", "cli", "tests", "benches"];

// One policy rule: a line regex plus the message shown when it matches.
struct Rule {
    pattern: &'static str,
    headline: &'static str,
    advice: &'static str,
    skip_line: fn(&str) -> bool,
}

const RULES: [Rule; 3] = [
    Rule {
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        headline: "underscore-prefixed variables",
        advice: "Underscore-prefixed variable names are not allowed in this project.\n   Either use the variable (removing the underscore) or remove it completely.",
        skip_line: policy::is_comment_or_string_match,
    },
    Rule {
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        headline: "#[allow(dead_code)] attributes",
        advice: "#[allow(dead_code)] attributes are STRICTLY FORBIDDEN in this project.\n   Either use the code (removing the attribute) or remove it completely.",
        skip_line: never_skip,
    },
    Rule {
        pattern: r"(//|/\*).*\b(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)\b",
        headline: "forbidden comment patterns",
        advice: "Comments narrating edits ('FIXED', 'NEW', 'CHANGED', 'UPDATED', ...) are STRICTLY FORBIDDEN in this project.\n   Describe what the code does, not how it got there.",
        skip_line: never_skip,
    },
];

// Collects every matching line in one file for a single rule.
struct ViolationCollector {
    violations: Vec<String>,
    skip_line: fn(&str) -> bool,
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if !(self.skip_line)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }

        // Keep searching the rest of the file.
        Ok(true)
    }
}

fn never_skip(_: &str) -> bool {
    false
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .filter(|root| Path::new(root).exists())
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn check_rule(rule: &Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();

    for path in files {
        let mut collector = ViolationCollector {
            violations: Vec::new(),
            skip_line: rule.skip_line,
        };
        searcher.search_path(&matcher, path, &mut collector)?;

        if !collector.violations.is_empty() {
            let mut error_msg = format!(
                "\n❌ ERROR: Found {} {} in {}:\n",
                collector.violations.len(),
                rule.headline,
                path.display()
            );
            for violation in &collector.violations {
                error_msg.push_str(&format!("   {violation}\n"));
            }
            error_msg.push_str(&format!("\n⚠️ {}\n", rule.advice));
            return Err(error_msg.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=build/policy.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let files = source_files();
    for rule in &RULES {
        if let Err(e) = check_rule(rule, &files) {
            // Printed to stderr so cargo shows it with the failed build.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
