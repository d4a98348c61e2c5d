use std::collections::HashMap;

use mindtrace_core::{Evaluation, EvaluationSummary, Metric, Session, Transcript};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

pub fn format_evaluation_readable(
    session: &Session,
    evaluation: &Evaluation,
    summary: &EvaluationSummary,
    transcript: Option<&Transcript>,
) -> String {
    let spans: HashMap<u32, (f64, f64)> = transcript
        .map(|t| {
            t.segments
                .iter()
                .map(|s| (s.id, (s.start_time, s.end_time)))
                .collect()
        })
        .unwrap_or_default();

    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", session.title));
    output.push_str(&format!(
        "**Topic:** {} | **Overall score:** {:.2}/10 | **Provider:** {}\n\n",
        session.topic, evaluation.overall_score, evaluation.provider_used
    ));

    output.push_str("## Metric averages\n\n");
    for metric in Metric::ALL {
        if let Some(average) = evaluation.metrics.get(metric) {
            output.push_str(&format!("• {}: {:.1}\n", metric.label(), average));
        }
    }
    output.push('\n');

    if !summary.strengths.is_empty() {
        output.push_str("## Strengths\n\n");
        for strength in &summary.strengths {
            output.push_str(&format!("• {}\n", strength));
        }
        output.push('\n');
    }

    if !summary.areas_for_improvement.is_empty() {
        output.push_str("## Areas for improvement\n\n");
        for area in &summary.areas_for_improvement {
            output.push_str(&format!("• {}\n", area));
        }
        output.push('\n');
    }

    output.push_str("## Topic alignment\n\n");
    output.push_str(&format!(
        "{} ({} of {} segments off topic)\n\n",
        summary.alignment.tier.describe(),
        summary.alignment.off_topic_segments,
        summary.alignment.total_segments
    ));

    output.push_str("## Segments\n\n");
    for segment in &evaluation.segments {
        match spans.get(&segment.segment_id) {
            Some((start, end)) => output.push_str(&format!(
                "### [{}–{}] Segment {} — {:.2}/10\n\n",
                format_timestamp(*start),
                format_timestamp(*end),
                segment.segment_id + 1,
                segment.overall_segment_score
            )),
            None => output.push_str(&format!(
                "### Segment {} — {:.2}/10\n\n",
                segment.segment_id + 1,
                segment.overall_segment_score
            )),
        }
        let preview: String = segment.text.chars().take(160).collect();
        if preview.len() < segment.text.len() {
            output.push_str(&format!("> {}…\n\n", preview.trim_end()));
        } else {
            output.push_str(&format!("> {}\n\n", preview.trim_end()));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_wrap_minutes() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.4), "01:05");
        assert_eq!(format_timestamp(600.0), "10:00");
    }
}
