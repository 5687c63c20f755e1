use {
    crate::{
        answer::{Answer, Reason},
        policy::Policy,
    },
    anyhow::{Result, bail},
    derive_more::Display,
    itertools::Itertools,
    std::{
        collections::HashMap,
        fmt::{self, Display as StdDisplay},
        future::Future,
        result::Result as StdResult,
        time::Duration,
    },
    strum_macros::EnumIs,
    tokio::{
        task::{Id, JoinError, JoinSet},
        time::{Instant, timeout, timeout_at},
    },
    tracing::{debug, info, instrument, warn},
};

/// One independent source of an answer, e.g. a single DNS or HTTP resolver.
///
/// The [Display] form identifies the asker in logs.
pub trait Asker: StdDisplay + Send + Sync + 'static {
    /// Produces exactly one answer. Must not share any per-request
    /// resources with other askers.
    fn ask(&self) -> impl Future<Output = Answer> + Send;
}

/// Runs a pool of askers and accepts the value that a strict majority
/// of them agree on.
pub struct Quorum<A> {
    askers: Vec<A>,
}

/// The running count of every distinct value reported during one aggregation.
#[derive(Clone, Default, Debug)]
pub struct Tally {
    counts: HashMap<String, usize>,
    reported: usize,
}

/// How an aggregation ended.
#[derive(Debug, Display, EnumIs)]
pub enum Outcome {
    #[display("agreed on {_0:?}")]
    Agreed(String),
    #[display("majority of askers failed [{_0}]")]
    Failed(Tally),
    #[display("no quorum [{_0}]")]
    NoQuorum(Tally),
    #[display("deadline expired [{_0}]")]
    Expired(Tally),
}

impl<A: Asker> Quorum<A> {
    pub fn new<I>(askers: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
    {
        let askers: Vec<_> = askers.into_iter().collect();
        if askers.is_empty() {
            bail!("non-empty list of askers is required")
        }

        Ok(Self { askers })
    }

    pub fn len(&self) -> usize {
        self.askers.len()
    }

    /// The count a value must reach to win: more than half of the pool.
    pub fn threshold(&self) -> usize {
        self.askers.len() / 2 + 1
    }

    /// Consumes the [Quorum], starting every asker at once and collecting
    /// the answers as they arrive.
    ///
    /// Returns as soon as some value crosses the [Self::threshold].
    /// Askers that are still running at that point are left to finish
    /// on their own; their answers are discarded.
    ///
    /// Without a deadline in the [Policy] this never returns if an asker hangs
    /// and the quorum cannot form without it.
    #[instrument(name = "quorum", skip_all, fields(askers = self.askers.len()))]
    pub async fn run(self, policy: Policy) -> Outcome {
        let threshold = self.threshold();
        let ask_timeout = policy.ask_timeout();
        // A deadline too far away to be represented is no deadline at all.
        let deadline = policy
            .deadline()
            .and_then(|after| Instant::now().checked_add(after));

        let mut pending = JoinSet::new();
        let mut names = HashMap::with_capacity(self.askers.len());
        for asker in self.askers {
            let name = asker.to_string();
            let handle = pending.spawn(async move { ask_within(&asker, ask_timeout).await });
            names.insert(handle.id(), name);
        }

        // Only this loop touches the tally.
        let mut tally = Tally::default();

        loop {
            let joined = match deadline {
                None => pending.join_next_with_id().await,
                Some(deadline) => match timeout_at(deadline, pending.join_next_with_id()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(%tally, "deadline expired before the quorum formed");
                        pending.detach_all();
                        return Outcome::Expired(tally);
                    }
                },
            };

            let Some(joined) = joined else {
                warn!(%tally, "every asker reported, but no value has the majority");
                return Outcome::NoQuorum(tally);
            };

            let (asker, answer) = settle(joined, &mut names);

            match answer.reason() {
                Some(reason) => warn!(asker = %asker, %reason, "asker failed"),
                None => debug!(asker = %asker, %answer, "asker answered"),
            }

            let count = tally.record(answer.value());
            if count < threshold {
                continue;
            }

            pending.detach_all();

            let value = answer.into_value();
            if value.is_empty() && policy.failures().is_reject() {
                warn!(count, threshold, "majority of askers failed");
                return Outcome::Failed(tally);
            }

            info!(value = %value, count, threshold, "quorum reached");
            return Outcome::Agreed(value);
        }
    }
}

// Pairs a finished task with the name of its asker.
// A task that panicked is reported as a failure of that asker.
fn settle(
    joined: StdResult<(Id, Answer), JoinError>,
    names: &mut HashMap<Id, String>,
) -> (String, Answer) {
    let (id, answer) = match joined {
        Ok((id, answer)) => (id, answer),
        Err(err) => (err.id(), Answer::Failure(Reason::Panicked)),
    };

    let name = names
        .remove(&id)
        .unwrap_or_else(|| format!("task {id}"));

    (name, answer)
}

async fn ask_within<A: Asker>(asker: &A, limit: Option<Duration>) -> Answer {
    match limit {
        None => asker.ask().await,
        Some(limit) => timeout(limit, asker.ask())
            .await
            .unwrap_or_else(|_| Answer::Failure(Reason::Timeout(limit))),
    }
}

impl Tally {
    // Returns the updated count of the value.
    fn record(&mut self, value: &str) -> usize {
        self.reported += 1;
        let count = self.counts.entry(value.to_owned()).or_default();
        *count += 1;
        *count
    }

    pub fn count(&self, value: &str) -> usize {
        self.counts.get(value).copied().unwrap_or_default()
    }

    /// How many askers have reported so far.
    pub fn reported(&self) -> usize {
        self.reported
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(value, count)| (value.as_str(), *count))
    }
}

impl StdDisplay for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self
            .iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)))
            .map(|(value, count)| format!("{value:?}: {count}"))
            .join(", ");

        f.write_str(&counts)
    }
}

impl Outcome {
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Agreed(value) => Some(value),
            _ => None,
        }
    }

    /// The agreed value, or the empty string for any other outcome.
    pub fn into_value(self) -> String {
        match self {
            Self::Agreed(value) => value,
            _ => String::new(),
        }
    }

    /// The tally observed by an aggregation that did not agree.
    pub fn tally(&self) -> Option<&Tally> {
        match self {
            Self::Agreed(_) => None,
            Self::Failed(tally) | Self::NoQuorum(tally) | Self::Expired(tally) => Some(tally),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::policy::FailurePolicy,
        std::future::pending,
        tokio::time::sleep,
    };

    const WAIT: Duration = Duration::from_secs(2);

    enum Script {
        Value(&'static str, u64),
        Fail(u64),
        Hang,
        Panic,
    }

    struct Fake {
        id: usize,
        script: Script,
    }

    impl StdDisplay for Fake {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake#{}", self.id)
        }
    }

    impl Asker for Fake {
        async fn ask(&self) -> Answer {
            match self.script {
                Script::Value(value, delay_ms) => {
                    sleep(Duration::from_millis(delay_ms)).await;
                    Answer::Value(value.to_string())
                }
                Script::Fail(delay_ms) => {
                    sleep(Duration::from_millis(delay_ms)).await;
                    Answer::Failure(Reason::transport(anyhow::anyhow!("connection refused")))
                }
                Script::Hang => pending().await,
                Script::Panic => panic!("asker blew up"),
            }
        }
    }

    fn pool<I>(scripts: I) -> Quorum<Fake>
    where
        I: IntoIterator<Item = Script>,
    {
        let askers = scripts
            .into_iter()
            .enumerate()
            .map(|(id, script)| Fake { id, script });

        Quorum::new(askers).unwrap()
    }

    async fn run_bounded(quorum: Quorum<Fake>, policy: Policy) -> Option<Outcome> {
        timeout(WAIT, quorum.run(policy)).await.ok()
    }

    #[test]
    fn threshold_is_strict_majority() {
        let sizes = [(1, 1), (2, 2), (3, 2), (4, 3), (5, 3), (18, 10)];
        for (size, threshold) in sizes {
            let quorum = pool((0..size).map(|_| Script::Hang));
            assert_eq!(quorum.len(), size);
            assert_eq!(quorum.threshold(), threshold, "pool of {size}");
        }
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(Quorum::<Fake>::new([]).is_err());
    }

    #[tokio::test]
    async fn majority_of_three_wins_in_any_order() {
        let orders = [[0, 10, 20], [20, 0, 10], [10, 20, 0], [20, 10, 0]];
        for [a, b, c] in orders {
            let quorum = pool([
                Script::Value("1.2.3.4", a),
                Script::Value("1.2.3.4", b),
                Script::Value("5.6.7.8", c),
            ]);

            let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
            assert_eq!(outcome.value(), Some("1.2.3.4"), "delays {a}/{b}/{c}");
        }
    }

    #[tokio::test]
    async fn ten_of_eighteen_beat_eight_failures() {
        let agreeing = (0..10).map(|i| Script::Value("9.9.9.9", i * 3));
        let failing = (0..8).map(|i| Script::Fail(i * 2));
        let quorum = pool(agreeing.chain(failing));

        let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
        assert_eq!(outcome.into_value(), "9.9.9.9");
    }

    #[tokio::test]
    async fn slow_askers_are_not_awaited() {
        let quorum = pool([
            Script::Value("1.2.3.4", 0),
            Script::Hang,
            Script::Value("1.2.3.4", 5),
        ]);

        let outcome = run_bounded(quorum, Policy::default()).await;
        assert!(matches!(outcome, Some(Outcome::Agreed(value)) if value == "1.2.3.4"));
    }

    #[tokio::test]
    async fn distinct_values_never_win() {
        let quorum = pool([
            Script::Value("1.1.1.1", 0),
            Script::Value("2.2.2.2", 5),
            Script::Value("3.3.3.3", 10),
            Script::Value("4.4.4.4", 15),
        ]);

        let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
        assert!(outcome.is_no_quorum());

        let tally = outcome.tally().unwrap();
        assert_eq!(tally.reported(), 4);
        assert!(tally.iter().all(|(_, count)| count == 1));
    }

    #[tokio::test]
    async fn even_split_never_wins() {
        let quorum = pool([
            Script::Value("1.1.1.1", 0),
            Script::Value("2.2.2.2", 0),
            Script::Value("1.1.1.1", 5),
            Script::Value("2.2.2.2", 5),
        ]);

        let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
        assert!(outcome.is_no_quorum());
        assert_eq!(outcome.into_value(), "");
    }

    #[tokio::test]
    async fn hung_asker_without_deadline_keeps_waiting() {
        // Three distinct answers plus one asker that never reports:
        // the missing answer could still make a majority, so there is no verdict.
        let quorum = pool([
            Script::Value("1.1.1.1", 0),
            Script::Value("2.2.2.2", 0),
            Script::Value("1.1.1.1", 0),
            Script::Hang,
        ]);

        let outcome = timeout(Duration::from_millis(200), quorum.run(Policy::default())).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn failures_win_by_default() {
        let quorum = pool([Script::Fail(0), Script::Value("1.2.3.4", 10), Script::Fail(5)]);

        let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
        assert!(matches!(outcome, Outcome::Agreed(ref value) if value.is_empty()));
    }

    #[tokio::test]
    async fn failures_can_be_rejected() {
        let quorum = pool([Script::Fail(0), Script::Value("1.2.3.4", 10), Script::Fail(5)]);
        let policy = Policy::default().with_failures(FailurePolicy::Reject);

        let outcome = run_bounded(quorum, policy).await.unwrap();
        assert!(outcome.is_failed());
        assert_eq!(outcome.tally().unwrap().count(""), 2);
    }

    #[tokio::test]
    async fn broken_askers_do_not_affect_others() {
        let quorum = pool([
            Script::Panic,
            Script::Value("1.2.3.4", 20),
            Script::Fail(0),
            Script::Value("1.2.3.4", 10),
            Script::Value("1.2.3.4", 0),
        ]);

        let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
        assert_eq!(outcome.value(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn panics_are_tallied_as_failures() {
        let quorum = pool([Script::Panic, Script::Panic, Script::Value("1.2.3.4", 50)]);
        let policy = Policy::default().with_failures(FailurePolicy::Reject);

        let outcome = run_bounded(quorum, policy).await.unwrap();
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn ask_timeout_turns_hangs_into_failures() {
        let quorum = pool([Script::Hang, Script::Value("1.2.3.4", 0), Script::Hang]);
        let policy = Policy::default().with_ask_timeout(Duration::from_millis(20));

        let outcome = run_bounded(quorum, policy).await.unwrap();
        assert!(matches!(outcome, Outcome::Agreed(ref value) if value.is_empty()));
    }

    #[tokio::test]
    async fn ask_timeout_spares_fast_askers() {
        let quorum = pool([
            Script::Value("1.2.3.4", 0),
            Script::Hang,
            Script::Value("1.2.3.4", 5),
        ]);
        let policy = Policy::default().with_ask_timeout(Duration::from_millis(500));

        let outcome = run_bounded(quorum, policy).await.unwrap();
        assert_eq!(outcome.value(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn deadline_ends_a_hung_aggregation() {
        let quorum = pool([
            Script::Value("1.1.1.1", 0),
            Script::Value("2.2.2.2", 0),
            Script::Hang,
        ]);
        let policy = Policy::default().with_deadline(Duration::from_millis(100));

        let outcome = run_bounded(quorum, policy).await.unwrap();
        assert!(outcome.is_expired());
        assert_eq!(outcome.tally().unwrap().reported(), 2);
    }

    #[tokio::test]
    async fn unrepresentable_deadline_means_no_deadline() {
        let quorum = pool([Script::Value("1.2.3.4", 0)]);
        let policy = Policy::default().with_deadline(Duration::MAX);

        let outcome = run_bounded(quorum, policy).await.unwrap();
        assert_eq!(outcome.value(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn panicked_task_keeps_its_asker_name() {
        let mut tasks: JoinSet<Answer> = JoinSet::new();
        let handle = tasks.spawn(async { panic!("asker blew up") });

        let mut names = HashMap::from([(handle.id(), "fake#7".to_string())]);
        let joined = tasks.join_next_with_id().await.unwrap();

        let (name, answer) = settle(joined, &mut names);
        assert_eq!(name, "fake#7");
        assert!(matches!(answer.reason(), Some(Reason::Panicked)));
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn finished_task_keeps_its_asker_name() {
        let mut tasks: JoinSet<Answer> = JoinSet::new();
        let handle = tasks.spawn(async { Answer::Value("1.2.3.4".to_string()) });

        let mut names = HashMap::from([(handle.id(), "fake#3".to_string())]);
        let joined = tasks.join_next_with_id().await.unwrap();

        let (name, answer) = settle(joined, &mut names);
        assert_eq!(name, "fake#3");
        assert_eq!(answer.value(), "1.2.3.4");
    }

    #[tokio::test]
    async fn tally_display_orders_by_count() {
        let quorum = pool([
            Script::Value("1.1.1.1", 0),
            Script::Fail(5),
            Script::Value("1.1.1.1", 10),
            Script::Value("2.2.2.2", 15),
        ]);

        let outcome = run_bounded(quorum, Policy::default()).await.unwrap();
        let tally = outcome.tally().unwrap();
        assert_eq!(tally.to_string(), r#""1.1.1.1": 2, "": 1, "2.2.2.2": 1"#);
    }
}
