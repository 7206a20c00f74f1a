// src/analyze/trends.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::news::EnrichedArticle;

static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•・]|\d{1,2}[.)、．])\s*(.+?)\s*$").unwrap());

/// Ranked trends from a model reply. Bulleted or numbered lines win; when the
/// reply has none, every non-empty line counts.
pub fn parse_trends(reply: &str, cap: usize) -> Vec<String> {
    let bulleted: Vec<String> = reply
        .lines()
        .filter_map(|l| BULLET.captures(l).map(|c| clean(&c[1])))
        .filter(|t| !t.is_empty())
        .collect();

    let trends = if bulleted.is_empty() {
        reply
            .lines()
            .map(clean)
            .filter(|t| !t.is_empty())
            .collect()
    } else {
        bulleted
    };
    trends.into_iter().take(cap).collect()
}

fn clean(line: &str) -> String {
    line.replace("**", "").trim().to_string()
}

/// `title: summary` lines, cut at `max_chars` characters.
pub fn trend_digest(articles: &[EnrichedArticle], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for a in articles {
        let line = format!("{}: {}\n", a.title, a.summary);
        let len = line.chars().count();
        if used + len > max_chars {
            out.extend(line.chars().take(max_chars - used));
            break;
        }
        out.push_str(&line);
        used += len;
    }
    out
}

/// Numbered list of the first `limit` articles for the daily summary prompt.
pub fn summary_digest(articles: &[EnrichedArticle], limit: usize) -> String {
    articles
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, a)| format!("{}. [{}] {} - {}", i + 1, a.category, a.title, a.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_and_numbers() {
        let reply = "Here are the trends:\n- **Agents** everywhere\n2) Open weights\n• 小型モデル\n";
        assert_eq!(
            parse_trends(reply, 5),
            vec!["Agents everywhere", "Open weights", "小型モデル"]
        );
    }

    #[test]
    fn plain_lines_when_no_bullets_and_capped() {
        let reply = "a\n\nb\nc\nd\ne\nf";
        assert_eq!(parse_trends(reply, 5), vec!["a", "b", "c", "d", "e"]);
        assert!(parse_trends("   \n", 5).is_empty());
    }
}
