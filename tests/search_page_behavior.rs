use search_page::{Error, HighlightOptions, Page, spinner_label};

const SEARCH_PAGE: &str = r#"<body><form name="searchform" method="get"><input type="text" name="q" value="cat"><input id="submit" type="submit" value="Search"></form><p id="result">Cat scatter</p></body>"#;

#[test]
fn submit_button_spins_every_hundred_milliseconds() -> search_page::Result<()> {
    let mut page = Page::from_html(SEARCH_PAGE)?;
    page.click("#submit")?;
    page.assert_disabled("#submit", true)?;
    page.assert_value("#submit", "Search")?;

    page.advance_time(99)?;
    page.assert_value("#submit", "Search")?;

    page.advance_time(1)?;
    page.assert_value("#submit", "Searching… \\")?;

    let mut seen = Vec::new();
    for _ in 0..4 {
        page.advance_time(100)?;
        seen.push(page.value("#submit")?);
    }
    assert_eq!(
        seen,
        vec![
            "Searching… |",
            "Searching… /",
            "Searching… -",
            "Searching… \\",
        ]
    );
    assert_eq!(page.now_ms(), 500);
    Ok(())
}

#[test]
fn disabled_button_ignores_further_clicks() -> search_page::Result<()> {
    let mut page = Page::from_html(SEARCH_PAGE)?;
    page.click("#submit")?;
    page.click("#submit")?;
    page.submit("#submit")?;
    assert_eq!(page.pending_timers().len(), 1);
    Ok(())
}

#[test]
fn typed_query_submits_from_the_field() -> search_page::Result<()> {
    let mut page = Page::from_html(SEARCH_PAGE)?;
    page.type_text("input[name=q]", "dog")?;
    page.assert_value("input[name=q]", "dog")?;
    assert_eq!(page.selection("input[name=q]")?, None);

    page.submit("input[name=q]")?;
    page.assert_disabled("#submit", true)?;
    assert!(page.run_next_timer()?);
    assert_eq!(page.now_ms(), 100);
    page.assert_value("#submit", &spinner_label(0))?;
    Ok(())
}

#[test]
fn timers_can_be_inspected_and_cleared() -> search_page::Result<()> {
    let mut page = Page::from_html(SEARCH_PAGE)?;
    let id = page.spin()?;
    let pending = page.pending_timers();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].due_at, 100);
    assert_eq!(pending[0].interval_ms, Some(100));

    page.advance_time_to(250)?;
    page.assert_value("#submit", &spinner_label(1))?;
    assert_eq!(page.pending_timers()[0].due_at, 300);

    assert!(page.advance_time_to(100).is_err());
    assert!(page.advance_time(-1).is_err());

    assert!(page.clear_timer(id));
    assert!(!page.clear_timer(id));
    page.advance_time(1_000)?;
    page.assert_value("#submit", &spinner_label(1))?;
    assert!(!page.run_next_timer()?);
    Ok(())
}

#[test]
fn run_due_timers_only_runs_what_is_due() -> search_page::Result<()> {
    let mut page = Page::from_html(SEARCH_PAGE)?;
    page.spin()?;
    assert_eq!(page.run_due_timers()?, 0);
    page.assert_value("#submit", "Search")?;
    assert_eq!(page.clear_all_timers(), 1);
    Ok(())
}

#[test]
fn missing_submit_control_is_reported() -> search_page::Result<()> {
    let html = r#"<form name="searchform"><input name="q" value="x"><button>Go</button></form>"#;
    let mut page = Page::from_html(html)?;
    let before = page.dump_dom("form")?;

    assert_eq!(page.submit("form"), Err(Error::SelectorNotFound("#submit".into())));
    assert_eq!(page.click("button"), Err(Error::SelectorNotFound("#submit".into())));
    assert!(page.pending_timers().is_empty());
    assert_eq!(page.dump_dom("form")?, before);
    Ok(())
}

#[test]
fn load_highlights_query_from_url() -> search_page::Result<()> {
    let page = Page::from_html_with_url("https://pda.example/search?q=cat&q=dog#top", SEARCH_PAGE)?;
    assert_eq!(page.query_param("q").as_deref(), Some("cat"));

    let report = page.highlight_report();
    assert_eq!(report.boundary_matches, 1);
    assert_eq!(report.mid_word_matches, 1);
    assert_eq!(report.total_matches(), 2);

    assert_eq!(
        page.dump_dom("#result")?,
        concat!(
            r#"<p id="result"><span style="background-color: yellow;">Cat</span>"#,
            r#" s<span style="background-color: orange;">cat</span>ter</p>"#
        )
    );
    page.assert_text("#result", "Cat scatter")?;
    assert_eq!(page.count("span")?, 2);
    Ok(())
}

#[test]
fn load_focuses_and_selects_the_search_field() -> search_page::Result<()> {
    let page = Page::from_html_with_url("/?q=cat", SEARCH_PAGE)?;
    assert!(page.is_focused("input[name=q]")?);
    assert_eq!(page.selection("input[name=q]")?, Some((0, 3)));
    Ok(())
}

#[test]
fn decoded_query_is_matched_literally() -> search_page::Result<()> {
    let html = r#"<body><p id="plus">a+b and aab</p><p id="space">big cat</p></body>"#;

    let page = Page::from_html_with_url("/?q=a%2Bb", html)?;
    page.assert_text("#plus", "a+b and aab")?;
    assert_eq!(page.highlight_report().total_matches(), 1);

    let page = Page::from_html_with_url("/?q=big+cat", html)?;
    assert_eq!(
        page.dump_dom("#space")?,
        r#"<p id="space"><span style="background-color: yellow;">big cat</span></p>"#
    );
    Ok(())
}

#[test]
fn blank_or_missing_query_leaves_page_untouched() -> search_page::Result<()> {
    for url in ["/", "/?q=", "/?q=+++", "/?other=cat"] {
        let page = Page::from_html_with_url(url, SEARCH_PAGE)?;
        assert_eq!(page.highlight_report().total_matches(), 0, "{url}");
        assert_eq!(page.dump_dom("#result")?, r#"<p id="result">Cat scatter</p>"#);
    }
    Ok(())
}

#[test]
fn assertion_failure_carries_snippet() -> search_page::Result<()> {
    let page = Page::from_html(SEARCH_PAGE)?;
    let Err(Error::AssertionFailed {
        selector,
        actual,
        dom_snippet,
        ..
    }) = page.assert_text("#result", "Dog")
    else {
        panic!("expected assertion failure");
    };
    assert_eq!(selector, "#result");
    assert_eq!(actual, "Cat scatter");
    assert!(dom_snippet.starts_with("<p id=\"result\">"));

    assert!(matches!(
        page.assert_exists("#nope"),
        Err(Error::SelectorNotFound(_))
    ));
    Ok(())
}

#[test]
fn custom_colors_and_runtime_tracing() -> search_page::Result<()> {
    let options = HighlightOptions {
        boundary_color: "#ff0".into(),
        mid_word_color: "#fa0".into(),
    };
    let mut page = Page::from_html_with_options("/?q=cat", SEARCH_PAGE, options)?;
    let dump = page.dump_dom("#result")?;
    assert!(dump.contains(r#"<span style="background-color: #ff0;">Cat</span>"#), "{dump}");
    assert!(dump.contains(r#"<span style="background-color: #fa0;">cat</span>"#), "{dump}");

    page.set_trace_stderr(false);
    page.enable_trace(true);
    assert!(!page.is_disabled("#submit")?);
    page.click("#submit")?;
    assert!(page.is_disabled("#submit")?);

    let logs = page.take_trace_logs();
    assert_eq!(
        logs,
        vec![
            "[page] submit form name=searchform".to_string(),
            "[spin] disabled #submit".to_string(),
            "[timer] schedule interval id=1 due_at=100 interval_ms=100".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn deep_pages_support_text_dump_and_assertions() -> search_page::Result<()> {
    let depth = 20_000;
    let html = format!(
        "<body>{}a needle here{}</body>",
        "<div>".repeat(depth),
        "</div>".repeat(depth)
    );
    let page = Page::from_html_with_url("/?q=needle", &html)?;
    assert_eq!(page.highlight_report().boundary_matches, 1);

    assert_eq!(page.text("body")?, "a needle here");
    page.assert_text("body", "a needle here")?;
    assert!(page.dump_dom("body")?.contains(
        r#"a <span style="background-color: yellow;">needle</span> here"#
    ));

    let Err(Error::AssertionFailed { dom_snippet, .. }) = page.assert_text("body", "x") else {
        panic!("expected assertion failure");
    };
    assert!(dom_snippet.ends_with("..."));
    Ok(())
}

#[test]
fn dumped_markup_escapes_decoded_entities() -> search_page::Result<()> {
    let html = r#"<body><p id="r" title="a &quot;b&quot;">1 &lt;b&gt; cat</p></body>"#;
    let page = Page::from_html_with_url("/?q=cat", html)?;
    assert_eq!(
        page.dump_dom("#r")?,
        r#"<p id="r" title="a &quot;b&quot;">1 &lt;b&gt; <span style="background-color: yellow;">cat</span></p>"#
    );
    page.assert_text("#r", "1 <b> cat")?;
    Ok(())
}
