use anyhow::anyhow;
use anyhow::Result;
use clap::Parser;
use colored::*;
use itertools::EitherOrBoth;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::{Command, Stdio};

lazy_static! {
    static ref EXPECTED_OUTPUT_PATTERN: Regex = Regex::new(r"// expect: ?(.*)").unwrap();
    static ref EXPECTED_ERROR_PATTERN: Regex = Regex::new(r"// expect error: ?(.*)").unwrap();
    static ref EXPECTED_RUNTIME_ERROR_PATTERN: Regex =
        Regex::new(r"// expect runtime error: (.+)").unwrap();
}

/// Expectations mined from a .lox file's comments:
///   `// expect: <line>`                exact stdout line, in order
///   `// expect error: <fragment>`      fragment of a compile diagnostic; exit 65
///   `// expect runtime error: <msg>`   first stderr line; exit 70
#[derive(Debug)]
struct Test {
    test_file: PathBuf,
    expected_output: Vec<String>,
    expected_errors: Vec<String>,
    expected_runtime_error: Option<String>,
    expected_exit_code: i32,
}

impl Test {
    fn try_parse(test_input_path: &Path) -> Result<Self> {
        let mut test = Test {
            test_file: test_input_path.to_path_buf(),
            expected_output: vec![],
            expected_errors: vec![],
            expected_runtime_error: None,
            expected_exit_code: 0,
        };
        let source = fs::read_to_string(test_input_path)?;
        for line in source.lines() {
            if let Some(rte) = EXPECTED_RUNTIME_ERROR_PATTERN.captures(line) {
                test.expected_runtime_error = Some(rte[1].to_owned());
                // A runtime error should exit with EX_SOFTWARE.
                test.expected_exit_code = 70;
            } else if let Some(ee) = EXPECTED_ERROR_PATTERN.captures(line) {
                test.expected_errors.push(ee[1].to_owned());
                // A compile error should exit with EX_DATAERR.
                test.expected_exit_code = 65;
            } else if let Some(eo) = EXPECTED_OUTPUT_PATTERN.captures(line) {
                test.expected_output.push(eo[1].to_owned());
            }
        }

        if !test.expected_errors.is_empty() && test.expected_runtime_error.is_some() {
            Err(anyhow!(
                "{}: cannot expect both compile and runtime errors",
                test_input_path.display()
            ))
        } else {
            Ok(test)
        }
    }

    fn validate_exit_code(&self, exit_code: i32) -> Result<()> {
        if exit_code == self.expected_exit_code {
            Ok(())
        } else {
            Err(anyhow!(
                "Expected exit code {} and got {}",
                self.expected_exit_code,
                exit_code
            ))
        }
    }

    fn validate_output(&self, std_out: &[String]) -> Result<()> {
        for pair in self.expected_output.iter().zip_longest(std_out.iter()) {
            match pair {
                EitherOrBoth::Both(expected, actual) if expected == actual => {}
                EitherOrBoth::Both(expected, actual) => {
                    return Err(anyhow!("Expected output '{}' and got '{}'", expected, actual));
                }
                EitherOrBoth::Left(expected) => {
                    return Err(anyhow!("Missing expected output '{}'", expected));
                }
                EitherOrBoth::Right(actual) => {
                    return Err(anyhow!("Unexpected extra output '{}'", actual));
                }
            }
        }
        Ok(())
    }

    fn validate_runtime_error(&self, std_err: &[String]) -> Result<()> {
        if let Some(expected_runtime_error) = &self.expected_runtime_error {
            match std_err.first() {
                Some(first) if first == expected_runtime_error => Ok(()),
                Some(first) => Err(anyhow!(
                    "Expected runtime error '{}' and got:\n{}",
                    expected_runtime_error,
                    first
                )),
                None => Err(anyhow!(
                    "Expected runtime error '{}' and got none",
                    expected_runtime_error
                )),
            }
        } else {
            Ok(())
        }
    }

    fn validate_compile_errors(&self, std_err: &[String]) -> Result<()> {
        for expected in &self.expected_errors {
            if !std_err.iter().any(|line| line.contains(expected)) {
                return Err(anyhow!("Missing expected error '{}'", expected));
            }
        }
        Ok(())
    }
}

fn run_test(test: &Test, prog: &str) -> Result<()> {
    let test_input_path = fs::canonicalize(&test.test_file)?;

    let output = Command::new(prog)
        .arg(&test_input_path)
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .output()?;

    let exit_code = output
        .status
        .code()
        .ok_or_else(|| anyhow!("interpreter terminated by signal"))?;

    let output_lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect();
    let error_lines: Vec<String> = String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_owned)
        .collect();

    test.validate_exit_code(exit_code)?;
    test.validate_runtime_error(&error_lines)?;
    test.validate_compile_errors(&error_lines)?;
    test.validate_output(&output_lines)?;

    Ok(())
}

fn collect_test_files(path: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();
        for entry in entries {
            collect_test_files(&entry, found)?;
        }
    } else if path.extension().map_or(false, |ext| ext == "lox") {
        found.push(path.to_path_buf());
    }
    Ok(())
}

/// Golden-file test runner for the interpreter binary
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Test files or directories to search for .lox files
    #[clap(default_value = "test_lox_files")]
    tests: Vec<String>,

    /// Interpreter binary under test
    #[clap(long, default_value = "target/debug/pylox")]
    interpreter: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut test_files = vec![];
    for test in &args.tests {
        collect_test_files(Path::new(test), &mut test_files)?;
    }
    if test_files.is_empty() {
        return Err(anyhow!("no .lox test files found in {:?}", args.tests));
    }

    let mut passed: u32 = 0;
    let mut failed: u32 = 0;
    let mut skipped: u32 = 0;

    for test_file in &test_files {
        let test = match Test::try_parse(test_file) {
            Ok(test) => test,
            Err(e) => {
                println!("{} {}: {}", "SKIP".yellow(), test_file.display(), e);
                skipped += 1;
                continue;
            }
        };
        match run_test(&test, &args.interpreter) {
            Ok(()) => {
                println!("{} {}", "PASS".green(), test_file.display());
                passed += 1;
            }
            Err(e) => {
                println!("{} {}: {}", "FAIL".red(), test_file.display(), e);
                failed += 1;
            }
        }
    }

    println!(
        "Passed: {} Failed: {} Skipped: {}",
        passed.to_string().green(),
        failed.to_string().red(),
        skipped.to_string().yellow(),
    );

    if failed > 0 {
        Err(anyhow!("{} test(s) failed", failed))
    } else {
        Ok(())
    }
}
