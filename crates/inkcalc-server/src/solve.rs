//! `inkcalc solve`: runs drawings from disk through the calculator, carrying
//! assignments from one image into the next.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use inkcalc_contracts::{PromptVariant, ResultValue, SolutionRecord, VariableBindings};
use inkcalc_engine::{error_chain_text, CalculationRequest, Calculator};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
pub struct SolveArgs {
    /// Drawings to solve, in order.
    #[arg(required = true)]
    pub images: Vec<PathBuf>,
    /// Seed a variable binding; repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
    pub vars: Vec<(String, ResultValue)>,
    /// Ask for plain answers without step-by-step working.
    #[arg(long)]
    pub basic: bool,
    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse_binding(raw: &str) -> Result<(String, ResultValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    let value = value.trim();
    let value = match value.parse::<serde_json::Number>() {
        Ok(number) => ResultValue::Number(number),
        Err(_) => ResultValue::Text(value.to_string()),
    };
    Ok((name.to_string(), value))
}

pub fn image_data_url(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

/// Returns the process exit code: 1 if any image could not be processed.
pub async fn run_solve(
    args: SolveArgs,
    calculator: &dyn Calculator,
    default_variant: PromptVariant,
    out: &mut dyn Write,
) -> Result<i32> {
    let variant = if args.basic {
        PromptVariant::Basic
    } else {
        default_variant
    };
    let mut bindings = VariableBindings::new();
    for (name, value) in args.vars {
        bindings.insert(name, value);
    }

    let mut failures = 0usize;
    let mut report: Vec<Value> = Vec::new();
    for path in &args.images {
        let label = path.display().to_string();
        let outcome = match image_data_url(path) {
            Ok(image) => {
                calculator
                    .calculate(CalculationRequest {
                        image,
                        bindings: bindings.clone(),
                        variant,
                    })
                    .await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(records) => {
                let learned = bindings.absorb(&records);
                tracing::debug!(image = %label, records = records.len(), learned, "image solved");
                if args.json {
                    report.push(json!({ "image": label, "status": "success", "data": records }));
                } else {
                    write_records(out, &label, &records)?;
                }
            }
            Err(err) => {
                failures += 1;
                let detail = error_chain_text(&err, 1024);
                if args.json {
                    report.push(json!({ "image": label, "status": "error", "error": detail }));
                } else {
                    writeln!(out, "== {label} ==")?;
                    writeln!(out, "  failed: {detail}")?;
                }
            }
        }
    }

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else if !bindings.is_empty() {
        writeln!(out, "variables: {}", bindings.to_prompt_json().replace('\n', " "))?;
    }
    Ok(if failures > 0 { 1 } else { 0 })
}

fn write_records(out: &mut dyn Write, label: &str, records: &[SolutionRecord]) -> Result<()> {
    writeln!(out, "== {label} ==")?;
    if records.is_empty() {
        writeln!(out, "  nothing recognized")?;
        return Ok(());
    }
    for record in records {
        if record.is_assignment {
            writeln!(out, "  {} := {}", record.expression, record.result)?;
        } else {
            writeln!(out, "  {} = {}", record.expression, record.result)?;
        }
        if !record.steps.is_empty() {
            writeln!(out, "    method: {}", record.method)?;
        }
        for step in &record.steps {
            writeln!(out, "      {}: {}", step.description, step.expression)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, RgbImage};

    use super::*;

    /// Returns one canned result per call and remembers the bindings it saw.
    struct ReplayCalculator {
        replies: Mutex<Vec<Result<Vec<SolutionRecord>, String>>>,
        seen: Mutex<Vec<(VariableBindings, PromptVariant)>>,
    }

    impl ReplayCalculator {
        fn new(replies: Vec<Result<Vec<SolutionRecord>, String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Calculator for ReplayCalculator {
        async fn calculate(&self, request: CalculationRequest) -> Result<Vec<SolutionRecord>> {
            assert!(request.image.starts_with("data:image/png;base64,"));
            self.seen
                .lock()
                .unwrap()
                .push((request.bindings, request.variant));
            let mut replies = self.replies.lock().unwrap();
            match replies.remove(0) {
                Ok(records) => Ok(records),
                Err(message) => Err(anyhow!(message)),
            }
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    fn args(images: Vec<PathBuf>) -> SolveArgs {
        SolveArgs {
            images,
            vars: Vec::new(),
            basic: false,
            json: false,
        }
    }

    #[test]
    fn binding_values_parse_as_numbers_or_text() {
        assert_eq!(
            parse_binding("x=4"),
            Ok(("x".to_string(), ResultValue::from(4)))
        );
        assert_eq!(
            parse_binding(" r = 2.5 ").map(|(_, value)| value.to_string()),
            Ok("2.5".to_string())
        );
        assert_eq!(
            parse_binding("name=pi"),
            Ok(("name".to_string(), ResultValue::from("pi")))
        );
        assert!(parse_binding("x").is_err());
        assert!(parse_binding("=4").is_err());
    }

    #[test]
    fn mime_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.JPG");
        fs::write(&path, b"jpeg").unwrap();
        assert_eq!(
            image_data_url(&path).unwrap(),
            format!("data:image/jpeg;base64,{}", BASE64.encode(b"jpeg"))
        );
        assert!(image_data_url(&dir.path().join("missing.png")).is_err());
    }

    #[tokio::test]
    async fn assignments_carry_into_later_images() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_png(dir.path(), "first.png");
        let second = write_png(dir.path(), "second.png");
        let calculator = ReplayCalculator::new(vec![
            Ok(vec![SolutionRecord::assignment("x", 4)]),
            Ok(vec![SolutionRecord::new("x + 1", 5)]),
        ]);

        let mut solve_args = args(vec![first, second]);
        solve_args.vars = vec![("y".to_string(), ResultValue::from(2))];
        let mut out = Vec::new();
        let code = run_solve(solve_args, &calculator, PromptVariant::Steps, &mut out)
            .await
            .unwrap();
        assert_eq!(code, 0);

        let seen = calculator.seen.lock().unwrap();
        assert_eq!(seen[0].0.len(), 1);
        assert_eq!(seen[1].0.get("x"), Some(&ResultValue::from(4)));
        assert_eq!(seen[1].0.get("y"), Some(&ResultValue::from(2)));
        assert_eq!(seen[1].1, PromptVariant::Steps);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("x := 4"), "{text}");
        assert!(text.contains("x + 1 = 5"), "{text}");
    }

    #[tokio::test]
    async fn empty_reply_reads_differently_from_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blank = write_png(dir.path(), "blank.png");
        let broken = write_png(dir.path(), "broken.png");
        let calculator =
            ReplayCalculator::new(vec![Ok(Vec::new()), Err("vision model task panicked".to_string())]);

        let mut out = Vec::new();
        let code = run_solve(args(vec![blank, broken]), &calculator, PromptVariant::Steps, &mut out)
            .await
            .unwrap();
        assert_eq!(code, 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("blank.png =="), "{text}");
        assert_eq!(lines[1], "  nothing recognized");
        assert!(lines[2].ends_with("broken.png =="), "{text}");
        assert_eq!(lines[3], "  failed: vision model task panicked");
    }

    #[tokio::test]
    async fn failures_set_exit_code_and_empty_results_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let blank = write_png(dir.path(), "blank.png");
        let broken = write_png(dir.path(), "broken.png");
        let calculator =
            ReplayCalculator::new(vec![Ok(Vec::new()), Err("vision model task panicked".to_string())]);

        let mut solve_args = args(vec![blank, broken]);
        solve_args.basic = true;
        solve_args.json = true;
        let mut out = Vec::new();
        let code = run_solve(solve_args, &calculator, PromptVariant::Steps, &mut out)
            .await
            .unwrap();
        assert_eq!(code, 1);
        assert_eq!(calculator.seen.lock().unwrap()[0].1, PromptVariant::Basic);

        let report: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report[0]["status"], json!("success"));
        assert_eq!(report[0]["data"], json!([]));
        assert_eq!(report[1]["status"], json!("error"));
        assert_eq!(report[1]["error"], json!("vision model task panicked"));
    }
}
