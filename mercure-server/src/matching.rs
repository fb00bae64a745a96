//! The matching+authorization predicate shared by every transport and by
//! history replay: a subscriber receives an update iff it requested a
//! matching topic and (the update is public, or the subscriber is
//! authorized for one of the update's topics).

use mercure_core::{TopicMatcher, Update};

use crate::subscriber::Subscriber;

pub fn accepts(matcher: &TopicMatcher, subscriber: &Subscriber, update: &Update) -> bool {
    let requested_match = update
        .topics
        .iter()
        .any(|topic| matcher.matches(&subscriber.requested_selectors, topic));
    if !requested_match {
        return false;
    }
    if !update.private {
        return true;
    }
    subscriber.all_topics
        || update
            .topics
            .iter()
            .any(|topic| matcher.matches(&subscriber.authorized_selectors, topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercure_core::Event;

    fn subscriber(requested: Vec<&str>, authorized: Vec<&str>, all_topics: bool) -> Subscriber {
        let (s, _handle) = Subscriber::new(
            "s1",
            None,
            requested.into_iter().map(String::from).collect(),
            authorized.into_iter().map(String::from).collect(),
            all_topics,
            None,
            10,
        );
        s
    }

    #[test]
    fn public_update_needs_only_requested_match() {
        let matcher = TopicMatcher::new();
        let s = subscriber(vec!["http://example.com/books/1"], vec![], false);
        let u = Update::public("http://example.com/books/1", Event::new("b", "x"));
        assert!(accepts(&matcher, &s, &u));
    }

    #[test]
    fn private_update_needs_authorization_too() {
        let matcher = TopicMatcher::new();
        let s = subscriber(vec!["http://example.com/reviews/{id}"], vec![], false);
        let u = Update::private("http://example.com/reviews/22", Event::new("a", "x"));
        assert!(!accepts(&matcher, &s, &u));
    }

    #[test]
    fn private_update_accepted_when_authorized() {
        let matcher = TopicMatcher::new();
        let s = subscriber(
            vec!["http://example.com/reviews/{id}"],
            vec!["http://example.com/reviews/22"],
            false,
        );
        let u = Update::private("http://example.com/reviews/22", Event::new("b", "x"));
        assert!(accepts(&matcher, &s, &u));
    }

    #[test]
    fn all_topics_bypasses_authorization_check() {
        let matcher = TopicMatcher::new();
        let s = subscriber(vec!["*"], vec![], true);
        let u = Update::private("anything", Event::new("c", "x"));
        assert!(accepts(&matcher, &s, &u));
    }

    #[test]
    fn non_matching_requested_topic_rejects_regardless_of_privacy() {
        let matcher = TopicMatcher::new();
        let s = subscriber(vec!["other"], vec!["*"], true);
        let u = Update::public("http://example.com/books/1", Event::new("d", "x"));
        assert!(!accepts(&matcher, &s, &u));
    }
}
