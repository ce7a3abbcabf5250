//! Broker-side subscription bookkeeping
//!
//! Several local routes may share one filter, but the broker only holds a
//! single subscription for it. `BrokerFilters` counts the routes per filter
//! and decides when a SUBSCRIBE or UNSUBSCRIBE has to go out. The request is
//! queued while the filter's map entry is locked, so an acquire and a release
//! on the same filter can never reorder their packets.

use crate::message::QoS;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct FilterState {
    refs: usize,
    qos: QoS,
}

/// Reference counts of the filters subscribed at the broker
#[derive(Debug, Default)]
pub(crate) struct BrokerFilters {
    filters: DashMap<String, FilterState>,
}

impl BrokerFilters {
    /// Create an empty set of broker filters
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take a reference on `filter`
    ///
    /// `request` runs for the first reference, or when `qos` is higher than
    /// the level already subscribed. If it fails no reference is taken.
    pub(crate) fn acquire<E>(
        &self,
        filter: &str,
        qos: QoS,
        request: impl FnOnce(QoS) -> Result<(), E>,
    ) -> Result<(), E> {
        match self.filters.entry(filter.to_string()) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                if qos.level() > state.qos.level() {
                    request(qos)?;
                    state.qos = qos;
                }
                state.refs += 1;
            }
            Entry::Vacant(entry) => {
                request(qos)?;
                entry.insert(FilterState { refs: 1, qos });
            }
        }
        Ok(())
    }

    /// Drop a reference on `filter`, running `request` for the last one
    ///
    /// The filter is forgotten even when `request` fails.
    pub(crate) fn release<E>(
        &self,
        filter: &str,
        request: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        let Entry::Occupied(mut entry) = self.filters.entry(filter.to_string()) else {
            return Ok(());
        };
        if entry.get().refs > 1 {
            entry.get_mut().refs -= 1;
            return Ok(());
        }
        let result = request();
        entry.remove();
        result
    }

    /// Run `request` for every live filter, returning how many succeeded
    ///
    /// Used after the broker starts a fresh session and has forgotten them.
    pub(crate) fn resubscribe<E>(
        &self,
        mut request: impl FnMut(&str, QoS) -> Result<(), E>,
        mut on_error: impl FnMut(&str, E),
    ) -> usize {
        let mut restored = 0;
        for entry in self.filters.iter() {
            match request(entry.key(), entry.value().qos) {
                Ok(()) => restored += 1,
                Err(err) => on_error(entry.key(), err),
            }
        }
        restored
    }

    /// Number of local routes holding `filter`
    pub(crate) fn refs(&self, filter: &str) -> usize {
        self.filters.get(filter).map_or(0, |state| state.refs)
    }

    pub(crate) fn len(&self) -> usize {
        self.filters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier, Mutex};

    type Requests = Mutex<Vec<String>>;

    fn subscribe<'a>(log: &'a Requests, filter: &str) -> impl FnOnce(QoS) -> Result<(), ()> + 'a {
        let filter = filter.to_string();
        move |qos| {
            log.lock()
                .unwrap()
                .push(format!("subscribe {filter} {}", qos.level()));
            Ok(())
        }
    }

    fn unsubscribe<'a>(log: &'a Requests, filter: &str) -> impl FnOnce() -> Result<(), ()> + 'a {
        let filter = filter.to_string();
        move || {
            log.lock().unwrap().push(format!("unsubscribe {filter}"));
            Ok(())
        }
    }

    #[test]
    fn test_unsubscribe_only_after_last_release() {
        let filters = BrokerFilters::new();
        let log = Requests::default();

        filters.acquire("a/res", QoS::AtLeastOnce, subscribe(&log, "a/res")).unwrap();
        filters.acquire("a/res", QoS::AtLeastOnce, subscribe(&log, "a/res")).unwrap();
        assert_eq!(filters.refs("a/res"), 2);

        filters.release("a/res", unsubscribe(&log, "a/res")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["subscribe a/res 1"]);
        assert_eq!(filters.refs("a/res"), 1);

        filters.release("a/res", unsubscribe(&log, "a/res")).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["subscribe a/res 1", "unsubscribe a/res"]
        );
        assert_eq!(filters.refs("a/res"), 0);
        assert_eq!(filters.len(), 0);
    }

    #[test]
    fn test_release_of_unknown_filter_sends_nothing() {
        let filters = BrokerFilters::new();
        let log = Requests::default();

        filters.release("never/held", unsubscribe(&log, "never/held")).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_subscribe_takes_no_reference() {
        let filters = BrokerFilters::new();

        let result = filters.acquire("a/b", QoS::AtLeastOnce, |_| Err("queue full"));
        assert_eq!(result, Err("queue full"));
        assert_eq!(filters.refs("a/b"), 0);

        // The next caller subscribes again
        let log = Requests::default();
        filters.acquire("a/b", QoS::AtLeastOnce, subscribe(&log, "a/b")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["subscribe a/b 1"]);
    }

    #[test]
    fn test_failed_unsubscribe_still_forgets_filter() {
        let filters = BrokerFilters::new();
        filters.acquire("a/b", QoS::AtMostOnce, |_| Ok::<_, ()>(())).unwrap();

        assert_eq!(filters.release("a/b", || Err("queue full")), Err("queue full"));
        assert_eq!(filters.len(), 0);
    }

    #[test]
    fn test_higher_qos_upgrades_subscription() {
        let filters = BrokerFilters::new();
        let log = Requests::default();

        filters.acquire("a/b", QoS::AtMostOnce, subscribe(&log, "a/b")).unwrap();
        filters.acquire("a/b", QoS::AtMostOnce, subscribe(&log, "a/b")).unwrap();
        filters.acquire("a/b", QoS::ExactlyOnce, subscribe(&log, "a/b")).unwrap();
        filters.acquire("a/b", QoS::AtLeastOnce, subscribe(&log, "a/b")).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["subscribe a/b 0", "subscribe a/b 2"]
        );
        assert_eq!(filters.refs("a/b"), 4);
    }

    #[test]
    fn test_resubscribe_replays_live_filters() {
        let filters = BrokerFilters::new();
        filters.acquire("a/res", QoS::AtLeastOnce, |_| Ok::<_, ()>(())).unwrap();
        filters.acquire("a/res", QoS::AtLeastOnce, |_| Ok::<_, ()>(())).unwrap();
        filters.acquire("dt/+/co2", QoS::AtMostOnce, |_| Ok::<_, ()>(())).unwrap();
        filters.acquire("gone", QoS::AtMostOnce, |_| Ok::<_, ()>(())).unwrap();
        filters.release("gone", || Ok::<_, ()>(())).unwrap();

        let mut replayed = Vec::new();
        let restored = filters.resubscribe(
            |filter, qos| {
                replayed.push((filter.to_string(), qos));
                Ok::<_, ()>(())
            },
            |_, _| {},
        );

        replayed.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(restored, 2);
        assert_eq!(
            replayed,
            vec![
                ("a/res".to_string(), QoS::AtLeastOnce),
                ("dt/+/co2".to_string(), QoS::AtMostOnce),
            ]
        );
    }

    #[test]
    fn test_resubscribe_reports_failures() {
        let filters = BrokerFilters::new();
        filters.acquire("a", QoS::AtMostOnce, |_| Ok::<_, ()>(())).unwrap();
        filters.acquire("b", QoS::AtMostOnce, |_| Ok::<_, ()>(())).unwrap();

        let mut failed = Vec::new();
        let restored = filters.resubscribe(
            |filter, _| if filter == "b" { Err("queue full") } else { Ok(()) },
            |filter, err| failed.push(format!("{filter}: {err}")),
        );

        assert_eq!(restored, 1);
        assert_eq!(failed, vec!["b: queue full"]);
        // A failed replay keeps the filter for the next session
        assert_eq!(filters.refs("b"), 1);
    }

    #[test]
    fn test_concurrent_acquire_and_release_keep_broker_subscribed() {
        // Whatever the interleaving, the last request queued for a filter
        // that still has a holder must be a subscribe
        for _ in 0..200 {
            let filters = Arc::new(BrokerFilters::new());
            let log = Arc::new(Requests::default());
            filters.acquire("a/res", QoS::AtLeastOnce, subscribe(&log, "a/res")).unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let releaser = {
                let (filters, log, barrier) = (filters.clone(), log.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    filters.release("a/res", unsubscribe(&log, "a/res")).unwrap();
                })
            };
            let acquirer = {
                let (filters, log, barrier) = (filters.clone(), log.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    filters.acquire("a/res", QoS::AtLeastOnce, subscribe(&log, "a/res")).unwrap();
                })
            };
            releaser.join().unwrap();
            acquirer.join().unwrap();

            assert_eq!(filters.refs("a/res"), 1);
            let log = log.lock().unwrap();
            assert_eq!(log.last().map(String::as_str), Some("subscribe a/res 1"));
        }
    }
}
