use console::Style;
use std::path::Path;

use crate::discovery::Plan;
use crate::report::{RunStatus, Summary, SurvivedMutant};

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{:.1}%", s * 100.0))
}

pub fn print_run_result(summary: &Summary, project: &Path) {
    let secs = summary.duration_ms as f64 / 1000.0;

    if summary.status == RunStatus::Aborted {
        let style = Style::new().yellow().bold();
        println!(
            "{} run stopped early: {} of the planned mutants were executed",
            style.apply_to("!"),
            summary.counts.total
        );
    }

    if summary.counts.survived == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {}: {} mutants, none survived ({} score, {}) in {:.1}s",
            style.apply_to("✓"),
            project.display(),
            summary.counts.total,
            format_score(summary.score),
            summary.policy,
            secs,
        );
    } else {
        let style = Style::new().yellow().bold();
        println!(
            "{} {}: {} survived / {} mutants ({} score, {}) in {:.1}s",
            style.apply_to("!"),
            project.display(),
            summary.counts.survived,
            summary.counts.total,
            format_score(summary.score),
            summary.policy,
            secs,
        );
    }

    let dim = Style::new().dim();
    if summary.counts.timed_out > 0 {
        println!("  {} {} mutants timed out", dim.apply_to("·"), summary.counts.timed_out);
    }
    if summary.counts.errored > 0 {
        println!("  {} {} mutants errored", dim.apply_to("·"), summary.counts.errored);
    }
    for err in &summary.file_errors {
        println!(
            "  {} skipped {}: {}",
            dim.apply_to("·"),
            err.file.display(),
            err.message
        );
    }

    if summary.rules.len() > 1 || summary.counts.survived > 0 {
        println!();
        for (rule, breakdown) in &summary.rules {
            println!(
                "  {:<12} {:>4} killed {:>4} survived {:>4} other  {}",
                rule,
                breakdown.counts.killed,
                breakdown.counts.survived,
                breakdown.counts.timed_out + breakdown.counts.errored,
                dim.apply_to(format_score(breakdown.score)),
            );
        }
    }

    if summary.survived_mutants.is_empty() {
        return;
    }
    println!();
    for m in &summary.survived_mutants {
        let ref_style = Style::new().cyan().bold();
        let loc_style = Style::new().dim();
        let op_style = Style::new().magenta();

        println!(
            "  {} {}:{} {} {} → {}",
            ref_style.apply_to(format!("@{}", m.ref_id)),
            m.file,
            m.line,
            loc_style.apply_to(format!("[{}]", m.rule)),
            op_style.apply_to(&m.original),
            op_style.apply_to(&m.replacement),
        );
    }
}

pub fn print_mutant_detail(m: &SurvivedMutant) {
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!(
        "{} {}:{} [{}]",
        ref_style.apply_to(format!("@{}", m.ref_id)),
        m.file,
        m.line,
        m.rule,
    );
    println!();

    for line in &m.context_before {
        println!("  {}", dim.apply_to(line));
    }

    for line in m.diff.lines() {
        if line.starts_with('-') {
            let del_style = Style::new().red();
            println!("  {}", del_style.apply_to(line));
        } else if line.starts_with('+') {
            let add_style = Style::new().green();
            println!("  {}", add_style.apply_to(line));
        }
    }

    for line in &m.context_after {
        println!("  {}", dim.apply_to(line));
    }
}

pub fn print_status(summary: &Summary) {
    println!(
        "Last run: {} mutants, {} killed, {} survived, {} timed out, {} errored ({} score, {})",
        summary.counts.total,
        summary.counts.killed,
        summary.counts.survived,
        summary.counts.timed_out,
        summary.counts.errored,
        format_score(summary.score),
        summary.policy,
    );

    if summary.counts.survived > 0 {
        println!();
        for m in &summary.survived_mutants {
            let ref_style = Style::new().cyan().bold();
            println!(
                "  {} {}:{} {} → {}",
                ref_style.apply_to(format!("@{}", m.ref_id)),
                m.file,
                m.line,
                m.original,
                m.replacement,
            );
        }
        println!();
        println!("Use `radiation show @m1` for details on a specific mutant.");
    }
}

pub fn print_plan(plan: &Plan) {
    let dim = Style::new().dim();
    for c in plan.candidates() {
        println!(
            "{:>4} {}:{}:{} {} {} → {}",
            c.index,
            c.file.display(),
            c.line,
            c.column,
            dim.apply_to(format!("[{}]", c.rule)),
            c.original_node,
            c.mutated_node,
        );
    }
    for err in &plan.file_errors {
        print_error(&format!("{}: {}", err.file.display(), err.message));
    }
    println!(
        "{} mutants in {} files",
        plan.candidate_count(),
        plan.files.len()
    );
}
