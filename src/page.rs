use super::*;
use crate::scheduler::{ScheduledTask, Scheduler, TimerTask};

/// Id of the control the spinner animates.
pub const SUBMIT_CONTROL_ID: &str = "submit";
/// `name` of the search form.
pub const SEARCH_FORM_NAME: &str = "searchform";
/// `name` of the search form's text field.
pub const SEARCH_FIELD_NAME: &str = "q";

const BLANK_URL: &str = "about:blank";
const DEFAULT_TIMER_STEP_LIMIT: usize = 10_000;
const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;
const SNIPPET_CHARS: usize = 200;

/// One loaded search page: its DOM, address, fake clock and trace log.
///
/// Loading runs the content-ready step (focus the search field, then
/// highlight the `q` term). Submitting the search form starts the spinner.
#[derive(Debug)]
pub struct Page {
    dom: Dom,
    location: Location,
    scheduler: Scheduler,
    highlight_options: HighlightOptions,
    highlight_report: HighlightReport,
    active_element: Option<NodeId>,
    timer_step_limit: usize,
    trace: bool,
    trace_timers: bool,
    trace_logs: Vec<String>,
    trace_log_limit: usize,
    trace_to_stderr: bool,
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        Self::from_html_with_url(BLANK_URL, html)
    }

    pub fn from_html_with_url(url: &str, html: &str) -> Result<Self> {
        let mut page = Self::parse(url, html)?;
        page.content_loaded()?;
        Ok(page)
    }

    /// Like [`Page::from_html_with_url`], but with tracing on from the start
    /// so the load itself is logged.
    pub fn from_html_traced(url: &str, html: &str) -> Result<Self> {
        let mut page = Self::parse(url, html)?;
        page.trace = true;
        page.trace_to_stderr = false;
        page.content_loaded()?;
        Ok(page)
    }

    pub fn from_html_with_options(
        url: &str,
        html: &str,
        highlight_options: HighlightOptions,
    ) -> Result<Self> {
        let mut page = Self::parse(url, html)?;
        page.highlight_options = highlight_options;
        page.content_loaded()?;
        Ok(page)
    }

    fn parse(url: &str, html: &str) -> Result<Self> {
        let dom = Dom::parse(html)?;
        Ok(Self {
            dom,
            location: Location::parse(url),
            scheduler: Scheduler::default(),
            highlight_options: HighlightOptions::default(),
            highlight_report: HighlightReport::default(),
            active_element: None,
            timer_step_limit: DEFAULT_TIMER_STEP_LIMIT,
            trace: false,
            trace_timers: true,
            trace_logs: Vec::new(),
            trace_log_limit: DEFAULT_TRACE_LOG_LIMIT,
            trace_to_stderr: true,
        })
    }

    fn content_loaded(&mut self) -> Result<()> {
        self.trace_line(format!("[page] content_loaded url={}", self.location.href()));
        self.focus_search_field()?;

        let report =
            highlight_with_options(&mut self.dom, self.location.search(), &self.highlight_options)?;
        self.trace_line(format!(
            "[highlight] boundary={} mid_word={} replaced_segments={}",
            report.boundary_matches, report.mid_word_matches, report.replaced_segments
        ));
        self.highlight_report = report;
        Ok(())
    }

    fn focus_search_field(&mut self) -> Result<()> {
        let field = self
            .dom
            .form_by_name(SEARCH_FORM_NAME)
            .and_then(|form| self.dom.named_control(form, SEARCH_FIELD_NAME));
        let Some(field) = field else {
            self.trace_line("[page] no search field to focus".into());
            return Ok(());
        };
        self.active_element = Some(field);
        self.dom.select_all(field)?;
        self.trace_line(format!(
            "[page] focus search field selection={:?}",
            self.dom.selection(field)
        ));
        Ok(())
    }

    /// Disables the submit control and starts its label animation.
    /// Returns the id of the interval timer.
    pub fn spin(&mut self) -> Result<i64> {
        let control = self
            .dom
            .by_id(SUBMIT_CONTROL_ID)
            .ok_or_else(|| Error::SelectorNotFound(format!("#{SUBMIT_CONTROL_ID}")))?;
        let (id, due_at) = spinner::start(&mut self.dom, &mut self.scheduler, control)?;
        self.trace_line(format!("[spin] disabled #{SUBMIT_CONTROL_ID}"));
        self.trace_timer_line(format!(
            "[timer] schedule interval id={} due_at={} interval_ms={}",
            id, due_at, SPINNER_INTERVAL_MS
        ));
        Ok(id)
    }

    pub fn highlight_report(&self) -> HighlightReport {
        self.highlight_report
    }

    pub fn url(&self) -> &str {
        self.location.href()
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.location
            .search_params()
            .get(name)
            .map(ToOwned::to_owned)
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    // User actions.

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) || self.dom.readonly(target) {
            return Ok(());
        }

        let tag = self
            .dom
            .tag_name(target)
            .ok_or_else(|| Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: "non-element".into(),
            })?
            .to_ascii_lowercase();

        if tag != "input" && tag != "textarea" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: tag,
            });
        }

        self.dom.set_value(target, text)?;
        self.active_element = Some(target);
        Ok(())
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            self.trace_line(format!("[page] click ignored on disabled {selector}"));
            return Ok(());
        }
        self.active_element = Some(target);

        if is_submit_control(&self.dom, target) {
            if let Some(form) = self.dom.find_ancestor_by_tag(target, "form") {
                self.dispatch_submit(form)?;
            }
        }
        Ok(())
    }

    /// Submits the selected form, or the form owning the selected control.
    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }

        let form = if is_form(&self.dom, target) {
            Some(target)
        } else {
            self.dom.find_ancestor_by_tag(target, "form")
        };

        if let Some(form) = form {
            self.dispatch_submit(form)?;
        }
        Ok(())
    }

    fn dispatch_submit(&mut self, form: NodeId) -> Result<()> {
        let name = self.dom.attr(form, "name").unwrap_or_default();
        self.trace_line(format!("[page] submit form name={name}"));
        if name == SEARCH_FORM_NAME {
            self.spin()?;
        }
        Ok(())
    }

    // Fake clock.

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Runtime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.timer_step_limit = max_steps;
        Ok(())
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.scheduler.pending()
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        let removed = self.scheduler.clear(timer_id);
        self.trace_timer_line(format!("[timer] clear id={timer_id} removed={removed}"));
        removed > 0
    }

    pub fn clear_all_timers(&mut self) -> usize {
        let cleared = self.scheduler.clear_all();
        self.trace_timer_line(format!("[timer] clear_all cleared={cleared}"));
        cleared
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        self.scheduler.now_ms = from.saturating_add(delta_ms);
        let ran = self.run_due_timers_internal()?;
        self.trace_timer_line(format!(
            "[timer] advance delta_ms={} from={} to={} ran_due={}",
            delta_ms, from, self.scheduler.now_ms, ran
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        let from = self.scheduler.now_ms;
        if target_ms < from {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={from})"
            )));
        }
        self.scheduler.now_ms = target_ms;
        let ran = self.run_due_timers_internal()?;
        self.trace_timer_line(format!(
            "[timer] advance_to from={} to={} ran_due={}",
            from, self.scheduler.now_ms, ran
        ));
        Ok(())
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_due_timers_internal()?;
        self.trace_timer_line(format!(
            "[timer] run_due now_ms={} ran={}",
            self.scheduler.now_ms, ran
        ));
        Ok(ran)
    }

    /// Runs the earliest timer, moving the clock forward to its due time.
    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.scheduler.next_task_index(None) else {
            self.trace_timer_line("[timer] run_next none".into());
            return Ok(false);
        };

        let task = self.scheduler.take(next_idx);
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_timer_task(task)?;
        Ok(true)
    }

    fn run_due_timers_internal(&mut self) -> Result<usize> {
        let due_limit = self.scheduler.now_ms;
        let mut steps = 0usize;
        while let Some(next_idx) = self.scheduler.next_task_index(Some(due_limit)) {
            steps += 1;
            if steps > self.timer_step_limit {
                return Err(self.timer_step_limit_error(steps, due_limit));
            }
            let task = self.scheduler.take(next_idx);
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn timer_step_limit_error(&self, steps: usize, due_limit: i64) -> Error {
        let next_task_desc = self
            .scheduler
            .next_task_index(Some(due_limit))
            .and_then(|idx| self.scheduler.peek(idx))
            .map(|task| {
                let interval_desc = task
                    .interval_ms
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "none".into());
                format!(
                    "id={},due_at={},order={},interval_ms={}",
                    task.id, task.due_at, task.order, interval_desc
                )
            })
            .unwrap_or_else(|| "none".into());

        Error::Runtime(format!(
            "timer queue exceeded max task steps: limit={}, steps={steps}, now_ms={}, due_limit={due_limit}, pending_tasks={}, next_task={}",
            self.timer_step_limit,
            self.scheduler.now_ms,
            self.scheduler.len(),
            next_task_desc
        ))
    }

    fn execute_timer_task(&mut self, mut task: ScheduledTask) -> Result<()> {
        self.trace_timer_line(format!(
            "[timer] run id={} task={} due_at={} now_ms={}",
            task.id,
            task.task.label(),
            task.due_at,
            self.scheduler.now_ms
        ));

        match &mut task.task {
            TimerTask::Spinner(tick) => {
                let label = tick.advance(&mut self.dom)?;
                self.trace_line(format!("[spin] label={label:?}"));
            }
        }

        let id = task.id;
        if let Some(due_at) = self.scheduler.requeue(task) {
            self.trace_timer_line(format!("[timer] requeue id={id} due_at={due_at}"));
        }
        Ok(())
    }

    // Inspection and assertions.

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn is_disabled(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        Ok(self.dom.disabled(target))
    }

    /// `id` attribute of the focused element, if it has one.
    pub fn active_element_id(&self) -> Option<String> {
        self.active_element
            .and_then(|node| self.dom.attr(node, "id"))
            .filter(|id| !id.is_empty())
    }

    pub fn is_focused(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        Ok(self.active_element == Some(target))
    }

    /// Selected byte range of a control's value, if any.
    pub fn selection(&self, selector: &str) -> Result<Option<(usize, usize)>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.selection(target))
    }

    pub fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.dom.query_selector_all(selector)?.len())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(self.assertion_failed(selector, target, expected, actual));
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(self.assertion_failed(selector, target, expected, actual));
        }
        Ok(())
    }

    pub fn assert_disabled(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.disabled(target);
        if actual != expected {
            return Err(self.assertion_failed(
                selector,
                target,
                &expected.to_string(),
                actual.to_string(),
            ));
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    fn assertion_failed(
        &self,
        selector: &str,
        target: NodeId,
        expected: &str,
        actual: String,
    ) -> Error {
        Error::AssertionFailed {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual,
            dom_snippet: truncate_chars(&self.dom.dump_node(target), SNIPPET_CHARS),
        }
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    // Tracing.

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_to_stderr = enabled;
    }

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.trace_timers = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Runtime(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_log_limit = max_entries;
        if self.trace_logs.len() > max_entries {
            let excess = self.trace_logs.len() - max_entries;
            self.trace_logs.drain(..excess);
        }
        Ok(())
    }

    fn trace_timer_line(&mut self, line: String) {
        if self.trace && self.trace_timers {
            self.trace_line(line);
        }
    }

    fn trace_line(&mut self, line: String) {
        if self.trace {
            if self.trace_to_stderr {
                eprintln!("{line}");
            }
            if self.trace_logs.len() >= self.trace_log_limit {
                self.trace_logs.remove(0);
            }
            self.trace_logs.push(line);
        }
    }
}

fn is_form(dom: &Dom, node_id: NodeId) -> bool {
    dom.tag_name(node_id)
        .map(|tag| tag.eq_ignore_ascii_case("form"))
        .unwrap_or(false)
}

fn is_submit_control(dom: &Dom, node_id: NodeId) -> bool {
    let Some(tag) = dom.tag_name(node_id) else {
        return false;
    };
    let kind = dom.attr(node_id, "type");

    if tag.eq_ignore_ascii_case("button") {
        return kind
            .map(|kind| kind.eq_ignore_ascii_case("submit"))
            .unwrap_or(true);
    }

    if tag.eq_ignore_ascii_case("input") {
        return kind
            .map(|kind| kind.eq_ignore_ascii_case("submit"))
            .unwrap_or(false);
    }

    false
}
