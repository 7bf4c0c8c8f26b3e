use crate::resolution::ResolutionCache;
use crate::test_support::{RecordingProjectHost, path_of};
use crate::watch::{WatchType, WatcherCloseReason};

#[test]
fn recording_window_snapshots_invalidations() {
    let mut cache = ResolutionCache::new(true);
    let a = path_of("/p/a.ts");
    let b = path_of("/p/b.ts");

    cache.invalidate(&a);
    cache.start_recording();
    assert!(cache.has_invalidated_resolution(&a));
    assert!(!cache.has_invalidated_resolution(&b));

    // An invalidation arriving outside the window lands in the next one.
    cache.invalidate(&b);
    let changed = cache.finish_recording();
    assert_eq!(changed, vec![a.clone()]);

    cache.start_recording();
    assert!(!cache.has_invalidated_resolution(&a));
    assert!(cache.has_invalidated_resolution(&b));
    assert_eq!(cache.finish_recording(), vec![b]);
}

#[test]
fn clear_invalidates_everything_for_one_window() {
    let mut cache = ResolutionCache::new(true);
    let a = path_of("/p/a.ts");

    cache.clear();
    cache.start_recording();
    assert!(cache.has_invalidated_resolution(&a));
    assert!(cache.has_invalidated_resolution(&path_of("/anything/else.ts")));
    cache.finish_recording();

    cache.start_recording();
    assert!(!cache.has_invalidated_resolution(&a));
    cache.finish_recording();
}

#[test]
fn failed_lookup_watchers_follow_the_reported_set() {
    let host = RecordingProjectHost::new();
    let mut cache = ResolutionCache::new(true);
    let a = path_of("/p/a.ts");
    let location = path_of("/p/node_modules/lodash/index.ts");

    cache.start_recording();
    cache.note_failed_lookup(&a, "/p/node_modules/lodash/index.ts");
    cache.finish_recording();
    cache.commit_failed_lookups(&host, "proj");
    assert_eq!(
        host.open_watchers(WatchType::FailedLookupLocation),
        vec![location.clone()]
    );

    // The next pass reports nothing, so the watcher closes as NotNeeded.
    cache.start_recording();
    cache.finish_recording();
    cache.commit_failed_lookups(&host, "proj");
    assert!(host.open_watchers(WatchType::FailedLookupLocation).is_empty());
    assert_eq!(
        host.last_close_reason(&location),
        Some(WatcherCloseReason::NotNeeded)
    );
}

#[test]
fn failed_lookup_event_invalidates_containing_files() {
    let host = RecordingProjectHost::new();
    let mut cache = ResolutionCache::new(true);
    let a = path_of("/p/a.ts");
    let location = path_of("/p/node_modules/lodash/index.ts");

    cache.start_recording();
    cache.note_failed_lookup(&a, "/p/node_modules/lodash/index.ts");
    cache.finish_recording();
    cache.commit_failed_lookups(&host, "proj");

    assert!(cache.invalidate_failed_lookup(&location));
    cache.start_recording();
    assert!(cache.has_invalidated_resolution(&a));
    cache.finish_recording();

    assert!(!cache.invalidate_failed_lookup(&path_of("/unknown")));
}

#[test]
fn close_watchers_drains_with_reason() {
    let host = RecordingProjectHost::new();
    let mut cache = ResolutionCache::new(true);
    let a = path_of("/p/a.ts");
    let location = path_of("/p/missing.d.ts");

    cache.start_recording();
    cache.note_failed_lookup(&a, "/p/missing.d.ts");
    cache.finish_recording();
    cache.commit_failed_lookups(&host, "proj");

    cache.close_watchers(&host, "proj", WatcherCloseReason::ProjectClose);
    assert!(host.open_watchers(WatchType::FailedLookupLocation).is_empty());
    assert_eq!(
        host.last_close_reason(&location),
        Some(WatcherCloseReason::ProjectClose)
    );
    assert_eq!(cache.watched_failed_lookups().count(), 0);
}
