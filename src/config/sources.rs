// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::Language::{En, Ja};
use crate::ingest::types::{FeedSource, Language};

const ENV_PATH: &str = "FEED_SOURCES_PATH";

/// Fixed display categories, in frontend order.
pub const CATEGORIES: [&str; 5] = ["Claude", "国内", "海外", "Reddit", "その他"];

#[rustfmt::skip]
const DEFAULT_FEEDS: &[(&str, &str, Language, &str)] = &[
    // Claude / Anthropic
    ("https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_anthropic_news.xml", "Claude", En, "Anthropic News"),
    ("https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_anthropic_research.xml", "Claude", En, "Anthropic Research"),
    ("https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_anthropic_engineering.xml", "Claude", En, "Anthropic Engineering"),
    ("https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_anthropic_changelog_claude_code.xml", "Claude", En, "Claude Code Changelog"),
    ("https://status.anthropic.com/history.rss", "Claude", En, "Anthropic Status"),
    // Reddit
    ("https://www.reddit.com/r/MachineLearning/.rss", "Reddit", En, "Reddit ML"),
    ("https://www.reddit.com/r/artificial/.rss", "Reddit", En, "Reddit AI"),
    ("https://www.reddit.com/r/OpenAI/.rss", "Reddit", En, "r/OpenAI"),
    ("https://www.reddit.com/r/ClaudeAI/.rss", "Reddit", En, "r/ClaudeAI"),
    ("https://www.reddit.com/r/LocalLLaMA/.rss", "Reddit", En, "r/LocalLLaMA"),
    // overseas
    ("https://techcrunch.com/category/artificial-intelligence/feed/", "海外", En, "TechCrunch AI"),
    ("https://www.technologyreview.com/feed/", "海外", En, "MIT Technology Review"),
    ("https://www.theverge.com/rss/index.xml", "海外", En, "The Verge"),
    ("https://feeds.feedburner.com/venturebeat/SZYF", "海外", En, "VentureBeat"),
    ("https://arstechnica.com/ai/feed/", "海外", En, "Ars Technica AI"),
    ("https://www.wired.com/feed/tag/ai/latest/rss", "海外", En, "WIRED AI"),
    ("https://openai.com/news/rss.xml", "海外", En, "OpenAI"),
    ("https://blogs.microsoft.com/ai/feed/", "海外", En, "Microsoft AI Blog"),
    ("https://raw.githubusercontent.com/Olshansk/rss-feeds/main/feeds/feed_ollama.xml", "海外", En, "Ollama Blog"),
    ("https://blog.langchain.dev/rss.xml", "海外", En, "LangChain Blog"),
    ("https://huggingface.co/blog/feed.xml", "海外", En, "Hugging Face Blog"),
    ("https://deepmind.com/blog/feed/basic/", "海外", En, "DeepMind"),
    ("https://feeds.feedburner.com/blogspot/gJZg", "海外", En, "Google Research Blog"),
    ("https://artificialintelligence-news.com/feed/", "海外", En, "AI News"),
    ("https://aibusiness.com/rss.xml", "海外", En, "AI Business"),
    ("https://simonwillison.net/atom/everything/", "海外", En, "Simon Willison's Weblog"),
    ("https://www.oneusefulthing.org/feed", "海外", En, "One Useful Thing"),
    // domestic
    ("https://www.ai-shift.co.jp/techblog/feed", "国内", Ja, "AI Shift Tech Blog"),
    ("https://zenn.dev/topics/ai/feed", "国内", Ja, "Zenn AI"),
    ("https://zenn.dev/topics/llm/feed", "国内", Ja, "Zenn LLM"),
    ("https://zenn.dev/topics/nlp/feed", "国内", Ja, "Zenn NLP"),
    ("https://zenn.dev/topics/%E6%A9%9F%E6%A2%B0%E5%AD%A6%E7%BF%92/feed", "国内", Ja, "Zenn 機械学習"),
    ("https://note.com/chatgpt_lab/rss", "国内", Ja, "ChatGPT ラボ"),
];

pub fn default_sources() -> Vec<FeedSource> {
    DEFAULT_FEEDS
        .iter()
        .map(|(url, category, language, name)| FeedSource::new(*url, *category, *language, *name))
        .collect()
}

/// Load feed sources from an explicit path. Supports TOML (`[[feed]]` tables) or a JSON array.
pub fn load_sources_from(path: &Path) -> Result<Vec<FeedSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing feed sources in {}", path.display()))
}

/// Load feed sources using env var + fallbacks:
/// 1) $FEED_SOURCES_PATH
/// 2) config/feeds.toml
/// 3) config/feeds.json
/// 4) built-in defaults
pub fn load_sources_default() -> Result<Vec<FeedSource>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        return Err(anyhow!("FEED_SOURCES_PATH points to non-existent path"));
    }
    for candidate in ["config/feeds.toml", "config/feeds.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_sources_from(&pb);
        }
    }
    Ok(default_sources())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<FeedSource>> {
    let sources = if hint_ext == "toml" || (hint_ext != "json" && s.contains("[[feed]]")) {
        #[derive(serde::Deserialize)]
        struct TomlFeeds {
            #[serde(default)]
            feed: Vec<FeedSource>,
        }
        toml::from_str::<TomlFeeds>(s)?.feed
    } else {
        serde_json::from_str::<Vec<FeedSource>>(s)?
    };
    clean_sources(sources)
}

fn clean_sources(items: Vec<FeedSource>) -> Result<Vec<FeedSource>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.url = it.url.trim().to_string();
        it.display_name = it.display_name.trim().to_string();
        if it.url.is_empty() {
            continue;
        }
        url::Url::parse(&it.url).with_context(|| format!("invalid feed url {:?}", it.url))?;
        if it.display_name.is_empty() {
            it.display_name = it.url.clone();
        }
        if seen.insert(it.url.clone()) {
            out.push(it);
        }
    }
    if out.is_empty() {
        return Err(anyhow!("no feed sources defined"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn defaults_use_known_categories() {
        let sources = default_sources();
        assert!(sources.len() > 20);
        assert!(sources.iter().all(|s| CATEGORIES.contains(&s.category.as_str())));
        assert!(sources.iter().any(|s| s.language == Language::Ja));
    }

    #[test]
    fn toml_and_json_formats() {
        let toml = r#"
            [[feed]]
            url = " https://a.example/rss "
            category = "海外"
            language = "en"
            name = "A"

            [[feed]]
            url = "https://a.example/rss"
            category = "海外"
            language = "en"
            name = "dup"
            enabled = false
        "#;
        let out = parse_sources(toml, "toml").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://a.example/rss");
        assert!(out[0].enabled);

        let json = r#"[{"url": "https://b.example/feed", "category": "国内", "language": "ja", "display_name": "B", "enabled": false}]"#;
        let out = parse_sources(json, "json").unwrap();
        assert_eq!(out[0].display_name, "B");
        assert!(!out[0].enabled);
    }

    #[test]
    fn bad_url_is_rejected() {
        let json = r#"[{"url": "not a url", "category": "x", "language": "en", "name": "B"}]"#;
        assert!(parse_sources(json, "json").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // no files: built-in list
        assert_eq!(load_sources_default().unwrap().len(), DEFAULT_FEEDS.len());

        let p_json = tmp.path().join("mine.json");
        fs::write(
            &p_json,
            r#"[{"url": "https://x.example/rss", "category": "その他", "language": "en", "name": "X"}]"#,
        )
        .unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        let v = load_sources_default().unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].display_name, "X");

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_sources_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
