//! Text rendering for the board, the feed, and stored machine expressions.
//!
//! Everything renders to a `String` so the shapes are testable; `main`
//! prints the result verbatim.

use paperz_client::{AnnotationCard, Board, PaperCard, SmDefinition};
use paperz_core::hash::EntryHash;
use paperz_core::sensemaker::{SensemakerEntry, SmValue};
use paperz_core::types::Meme;

/// Hash prefix shown wherever a full base64 hash would drown the row.
const HASH_PREFIX: usize = 12;

/// Longest filename or quoted text printed before truncation.
const MAX_TEXT: usize = 40;

// ── Board ──

/// The review board as vertical cards, one per paper.
pub fn render_board(board: &Board) -> String {
    if board.papers.is_empty() {
        return "no paperz yet\n".to_string();
    }
    let mut out = String::new();
    for card in &board.papers {
        render_paper(&mut out, card);
    }
    out
}

fn render_paper(out: &mut String, card: &PaperCard) {
    out.push_str(&format!(
        "=== {} ===\n",
        truncate(&card.paper.filename, MAX_TEXT)
    ));
    out.push_str(&format!("  {:<12} {}\n", "entry", short_hash(&card.hash)));
    out.push_str(&format!(
        "  {:<12} {}\n",
        "annotationz",
        card.annotationz.len()
    ));
    for ann in &card.annotationz {
        render_annotation(out, ann);
    }
    out.push('\n');
}

fn render_annotation(out: &mut String, card: &AnnotationCard) {
    out.push_str(&format!(
        "    [{}] page {} paragraph {}\n",
        short_hash(&card.hash),
        card.annotation.page_num,
        card.annotation.paragraph_num
    ));
    out.push_str(&format!(
        "      says       {}\n",
        truncate(&card.annotation.what_it_says, MAX_TEXT)
    ));
    out.push_str(&format!(
        "      should say {}\n",
        truncate(&card.annotation.what_it_should_say, MAX_TEXT)
    ));
    match &card.sm_data {
        Some((_, entry)) => out.push_str(&format!(
            "      state      {}\n",
            sm_value(&entry.output_flat_value)
        )),
        None => out.push_str("      state      (none)\n"),
    }
}

// ── Feed ──

/// The meme feed in hub order, one row per meme. Scores arrive already
/// computed, paired with each row.
pub fn render_feed(feed: &[(EntryHash, Meme, i64)]) -> String {
    if feed.is_empty() {
        return "no memez yet\n".to_string();
    }
    let mut out = String::new();
    for (hash, meme, score) in feed {
        out.push_str(&format!(
            "{score:>6}  {name:<width$}  {hash}\n",
            name = truncate(&meme.filename, MAX_TEXT),
            width = MAX_TEXT,
            hash = short_hash(hash)
        ));
    }
    out
}

// ── Machine expressions ──

/// Stored init and comp expressions for one path; multi-line expressions
/// keep their line breaks, indented under the label.
pub fn render_definition(path: &str, def: &SmDefinition) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {path} ===\n"));
    render_expr(&mut out, "init", def.init.as_ref());
    render_expr(&mut out, "comp", def.comp.as_ref());
    out
}

fn render_expr(out: &mut String, label: &str, stored: Option<&(EntryHash, SensemakerEntry)>) {
    match stored {
        Some((hash, entry)) => {
            out.push_str(&format!("  {label} [{}]\n", short_hash(hash)));
            for line in entry.expr_str.lines() {
                out.push_str(&format!("    {line}\n"));
            }
        }
        None => out.push_str(&format!("  {label} (unset)\n")),
    }
}

/// One machine state on a single line, as shown after a step.
pub fn render_sm_data(stored: Option<&(EntryHash, SensemakerEntry)>) -> String {
    match stored {
        Some((hash, entry)) => format!(
            "[{}] {}",
            short_hash(hash),
            sm_value(&entry.output_flat_value)
        ),
        None => "(none)".to_string(),
    }
}

// ── Helpers ──

fn sm_value(value: &SmValue) -> String {
    match value {
        SmValue::Int(n) => n.to_string(),
        SmValue::Bool(b) => b.to_string(),
        SmValue::Str(s) => s.clone(),
        SmValue::Unit => "()".to_string(),
    }
}

fn short_hash(hash: &EntryHash) -> String {
    let full = hash.to_base64();
    // Base64 text is ASCII, so a byte slice cannot split a character.
    if full.len() <= HASH_PREFIX {
        full
    } else {
        format!("{}..", &full[..HASH_PREFIX])
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max - 2).collect();
    format!("{cut}..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperz_core::types::{Annotation, Paper};

    fn eh(tag: u8) -> EntryHash {
        EntryHash::from_raw(vec![tag; 36])
    }

    fn annotated_board() -> Board {
        Board {
            papers: vec![PaperCard {
                hash: eh(1),
                paper: Paper::from_bytes("draft.pdf", b"pdf bytes"),
                annotationz: vec![AnnotationCard {
                    hash: eh(2),
                    annotation: Annotation {
                        paper_ref: eh(1),
                        page_num: 3,
                        paragraph_num: 1,
                        what_it_says: "teh".into(),
                        what_it_should_say: "the".into(),
                    },
                    sm_data: Some((
                        eh(3),
                        SensemakerEntry {
                            expr_str: "0".into(),
                            output_flat_value: SmValue::Int(1),
                        },
                    )),
                }],
            }],
        }
    }

    #[test]
    fn empty_board_has_a_placeholder() {
        assert_eq!(render_board(&Board::default()), "no paperz yet\n");
    }

    #[test]
    fn board_cards_carry_annotation_state() {
        let text = render_board(&annotated_board());
        assert!(text.contains("=== draft.pdf ==="));
        assert!(text.contains("page 3 paragraph 1"));
        assert!(text.contains("says       teh"));
        assert!(text.contains("state      1"));
    }

    #[test]
    fn missing_state_renders_as_none() {
        let mut board = annotated_board();
        board.papers[0].annotationz[0].sm_data = None;

        let text = render_board(&board);
        assert!(text.contains("state      (none)"));
    }

    #[test]
    fn feed_rows_pair_scores_with_names() {
        let feed = vec![
            (eh(4), Meme::from_bytes("cat.png", b"png"), 7),
            (eh(5), Meme::from_bytes("dog.png", b"png"), 0),
        ];

        let text = render_feed(&feed);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("     7  cat.png"));
        assert!(lines[1].starts_with("     0  dog.png"));
    }

    #[test]
    fn definition_shows_unset_slots() {
        let def = SmDefinition {
            init: None,
            comp: None,
        };

        let text = render_definition("annotationz", &def);
        assert!(text.contains("init (unset)"));
        assert!(text.contains("comp (unset)"));
    }

    #[test]
    fn multi_line_expressions_stay_indented() {
        let def = SmDefinition {
            init: None,
            comp: Some((
                eh(6),
                SensemakerEntry {
                    expr_str: "(lam [st act]\n  st)".into(),
                    output_flat_value: SmValue::Unit,
                },
            )),
        };

        let text = render_definition("annotationz", &def);
        assert!(text.contains("    (lam [st act]\n      st)\n"));
    }

    #[test]
    fn stepped_state_renders_on_one_line() {
        let entry = SensemakerEntry {
            expr_str: "0".into(),
            output_flat_value: SmValue::Int(2),
        };
        let stored = (eh(7), entry);

        let text = render_sm_data(Some(&stored));
        assert!(text.ends_with(" 2"));
        assert_eq!(render_sm_data(None), "(none)");
    }

    #[test]
    fn long_text_is_cut_at_the_limit() {
        let long = "x".repeat(60);
        let cut = truncate(&long, MAX_TEXT);
        assert_eq!(cut.chars().count(), MAX_TEXT);
        assert!(cut.ends_with(".."));
        assert_eq!(truncate("short", MAX_TEXT), "short");
    }
}
