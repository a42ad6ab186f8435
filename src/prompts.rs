//! Prompts for the slide-analysis call.
//!
//! The model is the only unreliable component in the pipeline, so the
//! instruction text spells out the page count and the 0-based, gap-free
//! indexing requirement in several ways. Reconciliation still assumes the
//! model may ignore all of it.
//!
//! Callers can override the system prompt via
//! [`crate::config::DeckConfig::system_prompt`]; the per-run instruction built
//! by [`analysis_instruction`] is always sent.

/// Default system prompt for the analysis call.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert presenter. You receive the pages of a PDF document as images and turn them into a narrated slide deck: one slide per page, each with a short title and speaker notes a presenter can read aloud.

Follow these rules precisely:

1. COVERAGE
   - Produce exactly one slide entry per page, in page order
   - Never merge, split, skip or reorder pages

2. TITLES
   - One concise line summarising what the page is about
   - No page numbers, no trailing punctuation

3. SPEAKER NOTES
   - A script the presenter can read verbatim while the page is shown
   - Explain the key points of that page for an audience seeing it for the first time
   - Plain text only, no Markdown

4. OUTPUT FORMAT
   - Output ONLY one JSON object, no commentary
   - Do NOT wrap the JSON in code fences"#;

/// The JSON shape the model must answer with.
pub const RESPONSE_SCHEMA_HINT: &str = r#"{
  "presentationTitle": "A comprehensive title for the whole document",
  "summary": "A short summary of the entire document",
  "slides": [
    {
      "pageIndex": 0,
      "title": "Title summarising page 1",
      "notes": "Speaker notes the presenter reads while page 1 is shown"
    }
  ]
}"#;

/// Build the per-run instruction sent together with the page images.
///
/// Page images are attached in order; image `k` is page index `k`.
pub fn analysis_instruction(page_count: usize, language: Option<&str>) -> String {
    let last = page_count.saturating_sub(1);
    let mut text = format!(
        "Analyse this PDF document page by page.\n\
\n\
REQUIRED CONDITIONS\n\
1. The document has exactly {page_count} pages. Analyse all {page_count} pages without missing a single one.\n\
2. The 'slides' array must contain exactly {page_count} elements.\n\
3. Assign 'pageIndex' as a contiguous 0-based sequence: the first page is 0 and the last page is {last}.\n\
4. Do not merge or skip pages.\n\
5. For every page write a title and detailed speaker notes based only on that page's content.\n\
\n\
The page images are attached in order: image 1 is pageIndex 0, image {page_count} is pageIndex {last}.\n"
    );

    if let Some(lang) = language.map(str::trim).filter(|l| !l.is_empty()) {
        text.push_str(&format!(
            "\nWrite the presentation title, summary, slide titles and speaker notes in {lang}.\n"
        ));
    }

    text.push_str("\nRespond with a JSON object in exactly this format:\n");
    text.push_str(RESPONSE_SCHEMA_HINT);
    text
}
