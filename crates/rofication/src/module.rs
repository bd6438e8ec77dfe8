use std::{sync::Arc, time::Duration};

use crate::{Backoff, Error, NotificationFetcher, NotificationSource, Notifications, Observable, Sink, Subscription};

/// Turns the current notification counts into something to display. `None` means "show nothing".
pub type RenderRule<O> = Arc<dyn Fn(&Notifications) -> Option<O> + Send + Sync>;

/// Shows nothing while there are no unread notifications, and the total count otherwise.
pub fn default_rule() -> RenderRule<String> {
    Arc::new(|notifications: &Notifications| match notifications.total() {
        0 => None,
        total => Some(total.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Time between the end of one fetch and the start of the next.
    pub interval: Duration,
    pub fetch_timeout: Duration,
    /// First retry delay after the daemon could not be reached. Doubles up to `interval`.
    pub backoff_initial: Duration,
    /// Skip pushing "nothing" when the previous push was already "nothing".
    pub suppress_repeated_empty: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(5),
            backoff_initial: Duration::from_secs(1),
            suppress_repeated_empty: false,
        }
    }
}

/// A status-bar module showing unread notifications.
///
/// The rendering rule can be replaced at any time through [`Module::output`] or the handle returned by
/// [`Module::rule`]; a running [`Module::stream`] re-renders with the new rule right away.
pub struct Module<O> {
    rule: Observable<RenderRule<O>>,
    config: ModuleConfig,
}

impl Module<String> {
    pub fn new(config: ModuleConfig) -> Self {
        Self::with_rule(config, default_rule())
    }
}

impl<O> Module<O> {
    pub fn with_rule(config: ModuleConfig, rule: RenderRule<O>) -> Self {
        Self { rule: Observable::with_value(rule), config }
    }

    /// Replace the rendering rule.
    pub fn output(&self, rule: impl Fn(&Notifications) -> Option<O> + Send + Sync + 'static) -> &Self {
        self.rule.set(Arc::new(rule));
        self
    }

    /// Handle to the slot holding the rendering rule, usable from other tasks and threads.
    pub fn rule(&self) -> Observable<RenderRule<O>> {
        self.rule.clone()
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Run the module, pushing into `sink` until the sink asks to stop.
    ///
    /// The first fetch happens immediately. Afterwards, the module waits for whichever comes first:
    /// a new rendering rule, which re-renders the last known notifications,
    /// or the refresh timer, which fetches again.
    /// Dropping the returned future stops the module as well.
    pub async fn stream<S: NotificationSource, K: Sink<O>>(&self, source: S, mut sink: K) {
        let mut fetcher = NotificationFetcher::new(
            source,
            self.config.interval,
            self.config.fetch_timeout,
            Backoff::new(self.config.backoff_initial, self.config.interval),
        );
        let mut state = LoopState::new(&self.rule, &self.config);

        log::info!("Starting notification module");
        let mut event = Event::Fetched(fetcher.fetch_once().await);
        loop {
            if state.react(event, &mut sink) == Flow::Stop {
                break;
            }
            event = tokio::select! {
                biased;
                _ = state.rule_changes.changed() => Event::RuleChanged,
                _ = fetcher.tick() => Event::Fetched(fetcher.fetch_once().await),
            };
        }
        log::info!("Notification module stopped");
    }
}

enum Event {
    Fetched(crate::Result<Notifications>),
    RuleChanged,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Everything the update loop remembers between iterations.
struct LoopState<'a, O> {
    rule: &'a Observable<RenderRule<O>>,
    rule_changes: Subscription<RenderRule<O>>,
    suppress_repeated_empty: bool,
    /// Last successfully fetched notifications. Kept when a fetch fails.
    notifications: Option<Notifications>,
    /// Whether the last thing pushed was an error, which the next output has to replace.
    showing_error: bool,
    /// Whether the last output pushed was "nothing".
    showing_nothing: bool,
}

impl<'a, O> LoopState<'a, O> {
    fn new(rule: &'a Observable<RenderRule<O>>, config: &ModuleConfig) -> Self {
        Self {
            rule,
            rule_changes: rule.subscribe(),
            suppress_repeated_empty: config.suppress_repeated_empty,
            notifications: None,
            showing_error: false,
            showing_nothing: false,
        }
    }

    fn react<K: Sink<O>>(&mut self, event: Event, sink: &mut K) -> Flow {
        match event {
            Event::Fetched(Ok(notifications)) => {
                log::debug!("Fetched notifications: {:?}", notifications);
                if !self.showing_error && self.notifications.as_ref() == Some(&notifications) {
                    log::debug!("Notifications unchanged, not re-rendering");
                    return Flow::Continue;
                }
                self.notifications = Some(notifications);
                self.render(sink);
                Flow::Continue
            }
            Event::Fetched(Err(err)) => self.report(err, sink),
            Event::RuleChanged => {
                log::debug!("Rendering rule changed");
                self.render(sink);
                Flow::Continue
            }
        }
    }

    fn render<K: Sink<O>>(&mut self, sink: &mut K) {
        let Some(notifications) = &self.notifications else {
            return;
        };
        let rule = self.rule_changes.latest().unwrap_or_else(|| self.rule.get());
        let output = rule(notifications);
        if output.is_none() && self.showing_nothing && self.suppress_repeated_empty && !self.showing_error {
            log::debug!("Nothing to show again, not pushing");
            return;
        }
        self.showing_nothing = output.is_none();
        self.showing_error = false;
        sink.push_output(output);
    }

    fn report<K: Sink<O>>(&mut self, err: Error, sink: &mut K) -> Flow {
        log::warn!("Failed to fetch notifications: {}", err);
        self.showing_error = true;
        if sink.push_error(err) {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}
