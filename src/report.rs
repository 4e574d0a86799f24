//! Human-readable rendering of comparison trees
//!
//! JSON output is the serialized [`ComparisonNode`]; this module only covers
//! the text view printed by the command line tool.

use crate::comparison::{ComparisonNode, LeafStats};
use crate::rollup::{rescale_energy_value, ConversionError, ENERGY_UNIT};
use std::fmt::Write as _;

/// Render a comparison tree as an indented text report
///
/// Energy values in mJ are rescaled to the most readable unit; all other
/// units are printed as stored.
///
/// # Example
/// ```
/// use phasestats::comparison::ComparisonNode;
/// use phasestats::report::render_text;
///
/// let text = render_text(&ComparisonNode::default()).unwrap();
/// assert!(text.starts_with("Single run"));
/// ```
pub fn render_text(node: &ComparisonNode) -> Result<String, ConversionError> {
    let mut out = String::new();

    match node.comparison_case {
        Some(case) => {
            let _ = writeln!(
                out,
                "Comparison: {} ({})",
                case,
                node.comparison_details.join(" vs ")
            );
        }
        None => {
            let _ = writeln!(out, "Single run");
        }
    }
    for (label, value) in node.common_info.iter() {
        let _ = writeln!(out, "  {}: {}", label, value);
    }

    for (phase, phase_node) in node.data.iter() {
        let _ = writeln!(out, "\n{}", phase);
        for (metric, metric_node) in phase_node.metrics.iter() {
            let _ = writeln!(
                out,
                "  {} [{}] ({})",
                metric_node.clean_name, metric_node.kind, metric
            );
            for detail in metric_node.data.iter().map(|(_, d)| d) {
                let _ = write!(out, "    {}", detail.name);
                if let Some(p) = detail.p_value {
                    let _ = write!(out, "  p={:.4}{}", p, significance_marker(detail.is_significant));
                }
                out.push('\n');

                for (key, leaf) in detail.data.iter() {
                    let _ = writeln!(
                        out,
                        "      {:<24} {}",
                        key,
                        format_leaf(leaf, &metric_node.unit)?
                    );
                }
            }
        }
    }

    Ok(out)
}

fn significance_marker(is_significant: Option<bool>) -> &'static str {
    match is_significant {
        Some(true) => " *",
        _ => "",
    }
}

/// `mean ± ci unit  n=...  p=...` for one leaf
fn format_leaf(leaf: &LeafStats, unit: &str) -> Result<String, ConversionError> {
    let Some(mean) = leaf.mean else {
        return Ok("-".to_string());
    };

    let (value, shown_unit, scale) = if unit == ENERGY_UNIT {
        let (scaled, scaled_unit) = rescale_energy_value(mean, unit)?;
        let scale = if mean != 0.0 { scaled / mean } else { 1.0 };
        (scaled, scaled_unit, scale)
    } else {
        (mean, unit, 1.0)
    };

    let mut text = format!("{:>14.2}", value);
    if let Some(ci) = leaf.ci {
        let _ = write!(text, " ± {:.2}", ci * scale);
    }
    let _ = write!(text, " {}  n={}", shown_unit, leaf.values.len());
    if let Some(p) = leaf.p_value {
        let _ = write!(text, "  p={:.4}{}", p, significance_marker(leaf.is_significant));
    }
    Ok(text)
}
