use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use crate::core::chart_type::ChartType;
use crate::core::tooltip_text::parse_selector;
use crate::core::types::{DateRange, DateSpanState, Freshness};
use crate::error::{ExtractError, ExtractResult};
use crate::extensions::{SnapshotContext, SnapshotEvent, SnapshotListener};
use crate::session::BrowserSession;

use super::{DomSelectors, ExtractorConfig};

const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parsed view of the page as of one refresh.
///
/// Replaced wholesale on every refresh, never patched. Equality ignores the
/// revision and hover-tooltip markup.
#[derive(Debug, Clone)]
pub struct ChartSnapshot {
    document: Html,
    html: String,
    fingerprint: String,
    chart_type: Option<ChartType>,
    date_span: DateSpanState,
    source_url: String,
    revision: u64,
}

impl PartialEq for ChartSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.chart_type == other.chart_type
            && self.date_span == other.date_span
            && self.source_url == other.source_url
    }
}

impl ChartSnapshot {
    /// Parses page markup; fails when the chart root is absent or the page
    /// shows more than one date-span control.
    pub fn parse(
        html: String,
        source_url: String,
        revision: u64,
        selectors: &DomSelectors,
    ) -> ExtractResult<Self> {
        let document = Html::parse_document(&html);
        let root = parse_selector(&selectors.chart_root)?;
        if document.select(&root).next().is_none() {
            return Err(ExtractError::ElementMissing {
                selector: selectors.chart_root.clone(),
            });
        }

        let fingerprint = fingerprint_without(&document, &selectors.tooltip)?;
        let chart_type = read_chart_type(&document, selectors)?;
        let date_span = read_date_span(&document, selectors)?;

        Ok(Self {
            document,
            html,
            fingerprint,
            chart_type,
            date_span,
            source_url,
            revision,
        })
    }

    #[must_use]
    pub fn document(&self) -> &Html {
        &self.document
    }

    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Markup with volatile tooltip nodes removed.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn chart_type(&self) -> Option<ChartType> {
        self.chart_type
    }

    #[must_use]
    pub fn date_span(&self) -> &DateSpanState {
        &self.date_span
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> ExtractResult<Vec<ElementRef<'_>>> {
        let parsed = parse_selector(selector)?;
        Ok(self.document.select(&parsed).collect())
    }

    /// Page title, trimmed.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.select("title")
            .ok()?
            .first()
            .map(|title| title.text().collect::<String>().trim().to_owned())
            .filter(|title| !title.is_empty())
    }
}

fn fingerprint_without(document: &Html, volatile: &str) -> ExtractResult<String> {
    let selector = parse_selector(volatile)?;
    let mut stripped = document.clone();
    let ids: Vec<_> = stripped.select(&selector).map(|node| node.id()).collect();
    for id in ids {
        if let Some(mut node) = stripped.tree.get_mut(id) {
            node.detach();
        }
    }
    Ok(stripped.root_element().html())
}

fn read_chart_type(document: &Html, selectors: &DomSelectors) -> ExtractResult<Option<ChartType>> {
    let groups = parse_selector(&selectors.series_group)?;
    let mut kinds: Vec<ChartType> = document
        .select(&groups)
        .filter_map(|group| group.value().classes().find_map(ChartType::from_series_class))
        .collect();
    kinds.sort_by_key(|kind| kind.kind());
    kinds.dedup();
    Ok(match kinds.as_slice() {
        [single] => Some(*single),
        _ => None,
    })
}

fn read_date_span(document: &Html, selectors: &DomSelectors) -> ExtractResult<DateSpanState> {
    let container = parse_selector(&selectors.date_span_container)?;
    let containers: Vec<ElementRef<'_>> = document.select(&container).collect();
    if containers.len() > 1 {
        return Err(ExtractError::AmbiguousDom {
            selector: selectors.date_span_container.clone(),
            count: containers.len(),
        });
    }

    let option = parse_selector(&selectors.date_span_option)?;
    let preset = containers.first().and_then(|container| {
        container
            .select(&option)
            .find(|node| {
                node.value()
                    .classes()
                    .any(|class| class == selectors.selected_class)
            })
            .map(|node| node.text().collect::<String>().trim().to_owned())
    });

    let input_date = |selector: &str| -> ExtractResult<Option<NaiveDate>> {
        let parsed = parse_selector(selector)?;
        Ok(document
            .select(&parsed)
            .next()
            .and_then(|input| input.value().attr("value"))
            .and_then(|value| NaiveDate::parse_from_str(value.trim(), INPUT_DATE_FORMAT).ok()))
    };

    Ok(DateSpanState {
        preset,
        custom_start: input_date(&selectors.custom_start_input)?,
        custom_end: input_date(&selectors.custom_end_input)?,
    })
}

/// Single source of truth for the displayed chart, shared by every
/// extractor working against one browser session.
///
/// The store owns the session, so all page interactions are serialized
/// through it. Share it as `Rc<ChartStateStore<S>>`; any interaction that
/// can change the chart must go through a `*_and_refresh` style helper (or
/// be followed by [`ChartStateStore::update_chart`]) before anyone reads
/// calibration or trace data again.
pub struct ChartStateStore<S: BrowserSession> {
    session: RefCell<S>,
    config: ExtractorConfig,
    snapshot: RefCell<Option<Rc<ChartSnapshot>>>,
    freshness: RefCell<Freshness>,
    next_revision: Cell<u64>,
    listeners: RefCell<Vec<Box<dyn SnapshotListener>>>,
}

impl<S: BrowserSession> ChartStateStore<S> {
    pub fn new(session: S, config: ExtractorConfig) -> ExtractResult<Self> {
        config.validate()?;
        Ok(Self {
            session: RefCell::new(session),
            config,
            snapshot: RefCell::new(None),
            freshness: RefCell::new(Freshness::Uninitialized),
            next_revision: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn into_shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    #[must_use]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    #[must_use]
    pub fn selectors(&self) -> &DomSelectors {
        &self.config.selectors
    }

    /// Latest snapshot, whatever its freshness.
    #[must_use]
    pub fn snapshot(&self) -> Option<Rc<ChartSnapshot>> {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn freshness(&self) -> Freshness {
        self.freshness.borrow().clone()
    }

    /// Latest snapshot, failing unless the last refresh succeeded.
    pub fn require_fresh(&self) -> ExtractResult<Rc<ChartSnapshot>> {
        match self.freshness() {
            Freshness::Fresh => self.snapshot().ok_or_else(|| {
                ExtractError::StaleSnapshot("no snapshot has been taken".to_owned())
            }),
            Freshness::Uninitialized => Err(ExtractError::StaleSnapshot(
                "no snapshot has been taken".to_owned(),
            )),
            Freshness::Stale { reason } => Err(ExtractError::StaleSnapshot(reason)),
        }
    }

    /// Runs `f` against the session without refreshing.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.session.borrow_mut())
    }

    /// Runs a session call under the configured retry policy.
    pub fn retry_interaction<T>(
        &self,
        label: &str,
        mut op: impl FnMut(&mut S) -> ExtractResult<T>,
    ) -> ExtractResult<T> {
        self.config.retry.run(
            label,
            |_| op(&mut self.session.borrow_mut()),
            |delay| self.session.borrow_mut().pause(delay),
        )
    }

    /// Flags the held snapshot as out of date.
    pub fn mark_stale(&self, reason: impl Into<String>) {
        *self.freshness.borrow_mut() = Freshness::Stale {
            reason: reason.into(),
        };
    }

    /// Re-reads the page into a fresh snapshot.
    ///
    /// On failure the previous snapshot is kept and flagged stale. A refresh
    /// that finds the page unchanged keeps the previous revision.
    pub fn update_chart(&self) -> ExtractResult<Rc<ChartSnapshot>> {
        match self.read_snapshot() {
            Ok(snapshot) => Ok(self.install(snapshot)),
            Err(err) => {
                warn!(error = %err, "chart snapshot refresh failed");
                self.mark_stale(format!("refresh failed: {err}"));
                self.emit(SnapshotEvent::RefreshFailed {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn read_snapshot(&self) -> ExtractResult<ChartSnapshot> {
        let root = self.config.selectors.chart_root.clone();
        let timeout = self.config.timeouts.element();
        self.retry_interaction(&root, |session| session.wait_for_selector(&root, timeout))?;
        let (html, url) = {
            let mut session = self.session.borrow_mut();
            (session.page_source()?, session.current_url()?)
        };
        ChartSnapshot::parse(html, url, self.next_revision.get(), &self.config.selectors)
    }

    fn install(&self, snapshot: ChartSnapshot) -> Rc<ChartSnapshot> {
        let previous = self.snapshot();
        let installed = match &previous {
            Some(previous) if **previous == snapshot => previous.clone(),
            _ => {
                self.next_revision.set(self.next_revision.get() + 1);
                Rc::new(snapshot)
            }
        };
        *self.snapshot.borrow_mut() = Some(installed.clone());
        *self.freshness.borrow_mut() = Freshness::Fresh;
        debug!(
            revision = installed.revision(),
            url = installed.source_url(),
            chart_type = ?installed.chart_type(),
            preset = ?installed.date_span().preset,
            "chart snapshot refreshed"
        );

        if let Some(previous) = previous {
            if previous.chart_type() != installed.chart_type() {
                self.emit(SnapshotEvent::ChartTypeChanged {
                    from: previous.chart_type(),
                    to: installed.chart_type(),
                });
            }
            if previous.date_span() != installed.date_span() {
                self.emit(SnapshotEvent::DateSpanChanged {
                    from: previous.date_span().clone(),
                    to: installed.date_span().clone(),
                });
            }
        }
        self.emit(SnapshotEvent::Refreshed {
            revision: installed.revision(),
        });
        installed
    }

    fn settle(&self) {
        let delay = self.config.timeouts.redraw_settle();
        self.session.borrow_mut().pause(delay);
    }

    /// Navigates to `url` and takes the first snapshot of it.
    pub fn load_page(&self, url: &str) -> ExtractResult<Rc<ChartSnapshot>> {
        info!(url, "loading chart page");
        self.mark_stale(format!("navigating to {url}"));
        self.session.borrow_mut().navigate(url)?;
        let root = self.config.selectors.chart_root.clone();
        let timeout = self.config.timeouts.page_load();
        self.retry_interaction(&root, |session| session.wait_for_selector(&root, timeout))?;
        self.update_chart()
    }

    /// Clicks `selector` and refreshes.
    pub fn click_and_refresh(&self, selector: &str) -> ExtractResult<Rc<ChartSnapshot>> {
        self.mark_stale(format!("clicked {selector}"));
        self.retry_interaction(selector, |session| session.click(selector))?;
        self.settle();
        self.update_chart()
    }

    fn current(&self) -> ExtractResult<Rc<ChartSnapshot>> {
        match self.require_fresh() {
            Ok(snapshot) => Ok(snapshot),
            Err(_) => self.update_chart(),
        }
    }

    /// Selects the date-span preset labelled `label`.
    pub fn select_date_span(&self, label: &str) -> ExtractResult<Rc<ChartSnapshot>> {
        let snapshot = self.current()?;
        if snapshot.date_span().preset.as_deref() == Some(label) {
            return Ok(snapshot);
        }

        let selectors = &self.config.selectors;
        let options = snapshot.select(&format!(
            "{} {}",
            selectors.date_span_container, selectors.date_span_option
        ))?;
        let position = options
            .iter()
            .position(|node| node.text().collect::<String>().trim() == label)
            .ok_or_else(|| ExtractError::ElementMissing {
                selector: format!("{} option `{label}`", selectors.date_span_container),
            })?;
        drop(options);

        let refreshed = self.click_and_refresh(&selectors.date_span_option_at(position + 1))?;
        if refreshed.date_span().preset.as_deref() != Some(label) {
            let reason = format!(
                "date span `{label}` not selected after click (page shows {:?})",
                refreshed.date_span().preset
            );
            self.mark_stale(reason.clone());
            return Err(ExtractError::StaleSnapshot(reason));
        }
        Ok(refreshed)
    }

    /// Selects the widest date-span preset.
    pub fn select_widest_date_span(&self) -> ExtractResult<Rc<ChartSnapshot>> {
        let widest = self.config.selectors.widest_date_span.clone();
        self.select_date_span(&widest)
    }

    /// Switches the chart to `chart_type` through the picker.
    pub fn force_chart_type(&self, chart_type: ChartType) -> ExtractResult<Rc<ChartSnapshot>> {
        let snapshot = self.current()?;
        if snapshot.chart_type() == Some(chart_type) {
            return Ok(snapshot);
        }
        debug!(from = ?snapshot.chart_type(), to = %chart_type, "forcing chart type");

        let selectors = &self.config.selectors;
        self.mark_stale(format!("switching chart type to {chart_type}"));
        self.retry_interaction(&selectors.chart_type_button, |session| {
            session.click(&selectors.chart_type_button)
        })?;
        let option = selectors.chart_type_option_for(chart_type);
        let refreshed = self.click_and_refresh(&option)?;
        if refreshed.chart_type() != Some(chart_type) {
            let reason = format!(
                "chart type still {:?} after selecting {chart_type}",
                refreshed.chart_type()
            );
            self.mark_stale(reason.clone());
            return Err(ExtractError::StaleSnapshot(reason));
        }
        Ok(refreshed)
    }

    /// Applies a custom date range through the calendar inputs.
    pub fn set_custom_date_range(&self, range: DateRange) -> ExtractResult<Rc<ChartSnapshot>> {
        let selectors = &self.config.selectors;
        self.mark_stale(format!("applying date range {} .. {}", range.start, range.end));
        let start = range.start.format(INPUT_DATE_FORMAT).to_string();
        let end = range.end.format(INPUT_DATE_FORMAT).to_string();
        self.retry_interaction(&selectors.custom_start_input, |session| {
            session.set_input_value(&selectors.custom_start_input, &start)
        })?;
        self.retry_interaction(&selectors.custom_end_input, |session| {
            session.set_input_value(&selectors.custom_end_input, &end)
        })?;
        let refreshed = self.click_and_refresh(&selectors.custom_range_apply)?;
        if refreshed.date_span().custom_range() != Some(range) {
            let reason = format!("custom range {} .. {} not applied", range.start, range.end);
            self.mark_stale(reason.clone());
            return Err(ExtractError::StaleSnapshot(reason));
        }
        Ok(refreshed)
    }

    /// Registers a listener with a unique, non-empty id.
    pub fn register_listener(&self, listener: Box<dyn SnapshotListener>) -> ExtractResult<()> {
        let listener_id = listener.id().to_owned();
        if listener_id.is_empty() {
            return Err(ExtractError::InvalidData(
                "listener id must not be empty".to_owned(),
            ));
        }
        let mut listeners = self.listeners.borrow_mut();
        if listeners.iter().any(|entry| entry.id() == listener_id) {
            return Err(ExtractError::InvalidData(format!(
                "listener with id `{listener_id}` is already registered"
            )));
        }
        listeners.push(listener);
        Ok(())
    }

    /// Unregisters a listener by id. Returns `true` when removed.
    pub fn unregister_listener(&self, listener_id: &str) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(position) = listeners.iter().position(|entry| entry.id() == listener_id) {
            listeners.remove(position);
            return true;
        }
        false
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    #[must_use]
    pub fn has_listener(&self, listener_id: &str) -> bool {
        self.listeners
            .borrow()
            .iter()
            .any(|listener| listener.id() == listener_id)
    }

    fn context(&self) -> SnapshotContext {
        let snapshot = self.snapshot();
        SnapshotContext {
            revision: snapshot.as_ref().map_or(0, |snapshot| snapshot.revision()),
            source_url: snapshot
                .as_ref()
                .map(|snapshot| snapshot.source_url().to_owned()),
            chart_type: snapshot.as_ref().and_then(|snapshot| snapshot.chart_type()),
            date_span: snapshot
                .as_ref()
                .map(|snapshot| snapshot.date_span().clone())
                .unwrap_or_default(),
            freshness: self.freshness(),
        }
    }

    fn emit(&self, event: SnapshotEvent) {
        let context = self.context();
        match self.listeners.try_borrow_mut() {
            Ok(mut listeners) => {
                for listener in listeners.iter_mut() {
                    listener.on_event(&event, &context);
                }
            }
            Err(_) => warn!(?event, "dropping snapshot event raised from inside a listener"),
        }
    }
}
