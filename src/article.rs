use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::steam::GameDetails;

/// One selected review with its dialect translation.
#[derive(Debug, Clone)]
pub struct TranslatedReview {
    pub original: String,
    pub translated: String,
    pub playtime_hours: u32,
    pub voted_up: bool,
}

/// Everything the renderer needs for one article. Assembled per game and
/// never persisted.
#[derive(Debug, Clone)]
pub struct ArticleData {
    pub details: GameDetails,
    pub generated_intro: String,
    pub reviews: Vec<TranslatedReview>,
    pub kansai_highlights: String,
    pub kansai_catch: String,
    pub generated_at: String,
}

/// URL slug for one game: the numeric id prefix guarantees uniqueness, the
/// name part keeps it readable. Non-ASCII is dropped, so a fully Japanese
/// title degrades to just the id.
pub fn slug(app_id: u32, name: &str) -> String {
    let mut cleaned = String::new();
    let mut last_dash = true;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
            last_dash = false;
        } else if !last_dash {
            cleaned.push('-');
            last_dash = true;
        }
    }
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        app_id.to_string()
    } else {
        format!("{app_id}-{cleaned}")
    }
}

fn escape_yaml(value: &str) -> String {
    value.replace('"', "\\\"")
}

fn playtime_label(hours: u32) -> &'static str {
    match hours {
        h if h >= 500 => "(Hardcore)",
        h if h >= 100 => "(Veteran)",
        h if h >= 30 => "(Experienced)",
        h if h >= 10 => "(Moderate)",
        _ => "",
    }
}

fn format_review(review: &TranslatedReview, index: usize) -> String {
    let emoji = if review.voted_up { "👍" } else { "👎" };
    let sentiment = if review.voted_up {
        "Recommended"
    } else {
        "Not Recommended"
    };
    let label = playtime_label(review.playtime_hours);
    format!(
        "### {emoji} Review {} ({sentiment})\n\n> {}\n\n**関西弁で言うと:**\n\n> {}\n\n🕐 {} hours played {label}",
        index + 1,
        review.original,
        review.translated,
        review.playtime_hours,
    )
}

/// Builds the whole Markdown document: frontmatter, info table, official
/// description, reviews with translations, highlights, store link. Pure
/// string assembly; no failure modes given well-typed input.
pub fn build_article(data: &ArticleData) -> String {
    let d = &data.details;

    let frontmatter = [
        "---".to_string(),
        format!("title: \"{}\"", escape_yaml(&d.name)),
        format!("appId: {}", d.app_id),
        format!(
            "genres: [{}]",
            d.genres
                .iter()
                .map(|g| format!("\"{}\"", escape_yaml(g)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        format!("price: \"{}\"", escape_yaml(&d.price)),
        format!("releaseDate: \"{}\"", escape_yaml(&d.release_date)),
        format!("developer: \"{}\"", escape_yaml(&d.developer)),
        format!("reviewScore: \"{}\"", escape_yaml(&d.review_score)),
        format!("reviewPercentage: {}", d.review_percentage),
        format!("headerImage: \"{}\"", d.header_image),
        format!("kansaiCatch: \"{}\"", escape_yaml(&data.kansai_catch)),
        format!("generatedAt: \"{}\"", data.generated_at),
        "---".to_string(),
    ]
    .join("\n");

    let review_display = if d.review_score.is_empty() {
        format!("好評率 {}%", d.review_percentage)
    } else {
        format!("{} ({}%)", d.review_score, d.review_percentage)
    };

    let info_table = [
        "| 項目 | 詳細 |".to_string(),
        "|------|------|".to_string(),
        format!("| ジャンル | {} |", d.genres.join(", ")),
        format!("| 価格 | {} |", d.price),
        format!("| リリース日 | {} |", d.release_date),
        format!("| 開発者 | {} |", d.developer),
        format!("| Steam評価 | {review_display} |"),
    ]
    .join("\n");

    let description = if d.detailed_description.is_empty() {
        &d.description
    } else {
        &d.detailed_description
    };

    let reviews = data
        .reviews
        .iter()
        .enumerate()
        .map(|(i, r)| format_review(r, i))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{frontmatter}\n\n\
         # 🎮 {name}\n\n\
         ![{name}]({header})\n\n\
         {info_table}\n\n\
         {intro}\n\n\
         ## 公式説明\n\n\
         {description}\n\n\
         ## ユーザーレビュー\n\n\
         {reviews}\n\n\
         ## ここがおもろい！\n\n\
         {highlights}\n\n\
         ---\n\n\
         🔗 [Steamストアページ](https://store.steampowered.com/app/{app_id}/)\n",
        name = d.name,
        header = d.header_image,
        intro = data.generated_intro,
        highlights = data.kansai_highlights,
        app_id = d.app_id,
    )
}

/// Writes `{slug}.md` under the output directory, creating it if needed.
pub fn save_article(output_dir: &Path, slug: &str, content: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .map_err(|err| Error::Io(format!("create {}: {err}", output_dir.display())))?;
    let path = output_dir.join(format!("{slug}.md"));
    fs::write(&path, content)
        .map_err(|err| Error::Io(format!("write {}: {err}", path.display())))?;
    Ok(())
}
