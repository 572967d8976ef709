use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use comic_sink::{
    CacheBudget, EntryOrdering, FrameCache, OpenEvent, OpenState, ReaderConfig, SiblingDirection,
    Sink, SinkError, SinkFactory,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};
use tempfile::tempdir;
use zip::CompressionMethod;
use zip::write::FileOptions;

fn png_bytes(value: u8) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(4, 4, Rgba([value, 0, 0, 255]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image).write_to(&mut cursor, ImageFormat::Png).expect("encode png");
    cursor.into_inner()
}

fn jpeg_bytes(gray: u8) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(4, 4, Rgb([gray, gray, gray]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut cursor, ImageFormat::Jpeg).expect("encode jpeg");
    cursor.into_inner()
}

fn create_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), options).expect("add dir");
        } else {
            zip.start_file(*name, options).expect("start file");
            zip.write_all(data).expect("write entry");
        }
    }

    zip.finish().expect("finish zip");
}

fn create_tar(path: &Path, entries: &[(&str, Vec<u8>)], gzip: bool) {
    let file = File::create(path).expect("create tar");
    if gzip {
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append_tar_entries(&mut builder, entries);
        builder.into_inner().expect("finish tar").finish().expect("finish gzip");
    } else {
        let mut builder = tar::Builder::new(file);
        append_tar_entries(&mut builder, entries);
        builder.into_inner().expect("finish tar");
    }
}

fn append_tar_entries<W: Write>(builder: &mut tar::Builder<W>, entries: &[(&str, Vec<u8>)]) {
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, *name, &data[..]).expect("append entry");
    }
}

fn new_factory() -> (Arc<FrameCache>, SinkFactory) {
    let cache = Arc::new(FrameCache::new(CacheBudget::default()));
    let factory = SinkFactory::new(Arc::clone(&cache), ReaderConfig::default());
    (cache, factory)
}

fn open_and_drain(sink: &dyn Sink, path: &Path) -> Vec<OpenEvent> {
    let rx = sink.open(path);
    let mut events = Vec::new();
    loop {
        let event = rx.recv_timeout(Duration::from_secs(30)).expect("open event");
        let done = matches!(event, OpenEvent::Ready { .. } | OpenEvent::Error(_));
        events.push(event);
        if done {
            return events;
        }
    }
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn unordered_entries_open_in_natural_order() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    create_zip(
        &archive,
        &[
            ("p10.png", png_bytes(10)),
            ("p1.png", png_bytes(1)),
            ("p2.png", png_bytes(2)),
        ],
    );

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    let events = open_and_drain(sink.as_ref(), &archive);

    assert!(matches!(events.last(), Some(OpenEvent::Ready { name }) if name == "book.cbz"));
    assert_eq!(sink.open_state(), OpenState::Open);
    assert_eq!(sink.num_of_images(), 3);

    // Numeric-aware order: p1, p2, p10 regardless of physical layout.
    for (page, value) in [(0usize, 1u8), (1, 2), (2, 10)] {
        let image = sink.image(page, 0).expect("page image");
        assert_eq!(image.pixels()[0], value, "page {page}");
    }
}

#[test]
fn mixed_alpha_names_follow_the_spec_scenario() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("alpha.cbz");
    create_zip(
        &archive,
        &[
            ("b.jpg", jpeg_bytes(128)),
            ("a.jpg", jpeg_bytes(50)),
            ("c.jpg", jpeg_bytes(200)),
        ],
    );

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    let events = open_and_drain(sink.as_ref(), &archive);
    assert!(matches!(events.last(), Some(OpenEvent::Ready { .. })));
    assert_eq!(sink.num_of_images(), 3);

    // a.jpg, b.jpg, c.jpg: gray levels must come back ascending.
    let mut grays = Vec::new();
    for page in 0..3 {
        let image = sink.image(page, 0).expect("page image");
        grays.push(image.pixels()[0]);
    }
    assert!(grays[0] < grays[1] && grays[1] < grays[2], "order was {grays:?}");
}

#[test]
fn repeated_requests_return_bit_identical_images() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    create_zip(&archive, &[("1.png", png_bytes(7)), ("2.png", png_bytes(8))]);

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);

    let first = sink.image(0, 0).expect("first request");
    let second = sink.image(0, 0).expect("second request");
    assert_eq!(first.pixels(), second.pixels());
    assert_eq!(first.dimensions, second.dimensions);
}

#[test]
fn out_of_range_pages_are_rejected() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    create_zip(&archive, &[("1.png", png_bytes(1))]);

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);

    assert_eq!(sink.num_of_images(), 1);
    assert_eq!(sink.image(1, 0).unwrap_err(), SinkError::OutOfRange(1));
    assert_eq!(sink.image(999, 5).unwrap_err(), SinkError::OutOfRange(999));
}

#[test]
fn archive_without_images_is_empty() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("no-pages.cbz");
    create_zip(&archive, &[("notes.txt", b"text only".to_vec())]);

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    let events = open_and_drain(sink.as_ref(), &archive);

    assert!(matches!(events.last(), Some(OpenEvent::Error(SinkError::Empty))));
    assert_eq!(sink.open_state(), OpenState::Error);
    assert_eq!(sink.num_of_images(), 0);
}

#[test]
fn unrecognized_paths_never_become_sinks() {
    let dir = tempdir().unwrap();
    let plain = dir.path().join("notes.txt");
    std::fs::write(&plain, b"not an archive").unwrap();

    let (_cache, factory) = new_factory();
    assert_eq!(factory.create(&plain).unwrap_err(), SinkError::UnsupportedFormat);

    let rar_named = dir.path().join("book.cbr");
    std::fs::write(&rar_named, b"Rar!\x1a\x07\x00junk").unwrap();
    assert_eq!(factory.create(&rar_named).unwrap_err(), SinkError::UnsupportedFormat);
}

#[test]
fn escaping_entry_paths_are_dropped_at_scan() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("evil.cbz");
    create_zip(
        &archive,
        &[("../escape.png", png_bytes(66)), ("ok.png", png_bytes(5))],
    );

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);

    assert_eq!(sink.num_of_images(), 1);
    let image = sink.image(0, 0).expect("safe entry");
    assert_eq!(image.pixels()[0], 5);
    assert!(!dir.path().join("escape.png").exists());
}

#[test]
fn preload_extracts_following_pages_in_the_background() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    let entries: Vec<(String, Vec<u8>)> =
        (1..=5).map(|n| (format!("{n}.png"), png_bytes(n as u8))).collect();
    let borrowed: Vec<(&str, Vec<u8>)> =
        entries.iter().map(|(name, data)| (name.as_str(), data.clone())).collect();
    create_zip(&archive, &borrowed);

    let (cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);

    let image = sink.image(1, 2).expect("page 1");
    assert_eq!(image.pixels()[0], 2);

    // Pages 2 and 3 are extracted in the background without further calls.
    assert!(
        wait_until(Duration::from_secs(30), || cache.has(2) && cache.has(3)),
        "preload did not populate the cache"
    );
    assert!(cache.has(1), "the served page itself is cached");
    assert!(!cache.has(4), "preload must stop at the requested window");
}

#[test]
fn tar_and_tar_gz_containers_work_like_zip() {
    let dir = tempdir().unwrap();

    let tar_path = dir.path().join("book.cbt");
    create_tar(
        &tar_path,
        &[("2.png", png_bytes(2)), ("1.png", png_bytes(1))],
        false,
    );

    let (_cache, factory) = new_factory();
    let sink = factory.create(&tar_path).expect("tar sink");
    let events = open_and_drain(sink.as_ref(), &tar_path);
    assert!(matches!(events.last(), Some(OpenEvent::Ready { .. })));
    assert_eq!(sink.num_of_images(), 2);
    assert_eq!(sink.image(0, 0).expect("tar page").pixels()[0], 1);

    let tgz_path = dir.path().join("book.tar.gz");
    create_tar(&tgz_path, &[("only.png", png_bytes(9))], true);

    let sink = factory.create(&tgz_path).expect("tar.gz sink");
    open_and_drain(sink.as_ref(), &tgz_path);
    assert_eq!(sink.num_of_images(), 1);
    assert_eq!(sink.image(0, 0).expect("tar.gz page").pixels()[0], 9);
}

#[test]
fn long_scans_report_progress() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("thick.cbz");
    let page = png_bytes(1);
    let entries: Vec<(String, Vec<u8>)> =
        (1..=40).map(|n| (format!("{n:03}.png"), page.clone())).collect();
    let borrowed: Vec<(&str, Vec<u8>)> =
        entries.iter().map(|(name, data)| (name.as_str(), data.clone())).collect();
    create_zip(&archive, &borrowed);

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    let events = open_and_drain(sink.as_ref(), &archive);

    let progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            OpenEvent::Progress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty(), "expected advisory progress during the scan");
    assert!(progress.iter().all(|(current, total)| current <= total && *total == 40));
}

#[test]
fn close_discards_state_but_not_the_shared_cache() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    create_zip(&archive, &[("1.png", png_bytes(1))]);

    let (cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);
    sink.image(0, 0).expect("page");
    assert!(cache.has(0));

    sink.close();
    sink.close();
    assert_eq!(sink.open_state(), OpenState::Closed);
    assert_eq!(sink.num_of_images(), 0);
    assert_eq!(sink.image(0, 0).unwrap_err(), SinkError::OutOfRange(0));

    // Clearing on container switch is the caller's obligation, not close()'s.
    assert!(cache.has(0));
    cache.clear();
    assert!(!cache.has(0));
}

#[test]
fn sort_reorders_without_rescanning() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    create_zip(
        &archive,
        &[
            ("p1.png", png_bytes(1)),
            ("p2.png", png_bytes(2)),
            ("p10.png", png_bytes(10)),
        ],
    );

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);
    assert_eq!(sink.image(1, 0).expect("natural page 1").pixels()[0], 2);

    sink.sort(EntryOrdering::Lexicographic);
    assert_eq!(sink.num_of_images(), 3);
    // Lexicographic: p1, p10, p2.
    assert_eq!(sink.image(1, 0).expect("lexicographic page 1").pixels()[0], 10);
    assert_eq!(sink.image(2, 0).expect("lexicographic page 2").pixels()[0], 2);
}

#[test]
fn sibling_navigation_is_an_archive_capability() {
    let dir = tempdir().unwrap();
    for (name, value) in [("vol1.cbz", 1u8), ("vol2.cbz", 2), ("vol10.cbz", 10)] {
        create_zip(&dir.path().join(name), &[("1.png", png_bytes(value))]);
    }

    let (_cache, factory) = new_factory();
    let sink = factory.create(&dir.path().join("vol2.cbz")).expect("sink");
    assert!(sink.supports_sibling_navigation());

    // Not open yet: no sibling answers.
    assert_eq!(sink.sibling_container(SiblingDirection::Next), None);

    open_and_drain(sink.as_ref(), &dir.path().join("vol2.cbz"));
    assert_eq!(
        sink.sibling_container(SiblingDirection::Next),
        Some(dir.path().join("vol10.cbz"))
    );
    assert_eq!(
        sink.sibling_container(SiblingDirection::Previous),
        Some(dir.path().join("vol1.cbz"))
    );
}

#[test]
fn corrupt_entry_is_a_local_load_error() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("book.cbz");
    create_zip(
        &archive,
        &[
            ("1.png", png_bytes(1)),
            ("2.png", b"these are not image bytes".to_vec()),
        ],
    );

    let (_cache, factory) = new_factory();
    let sink = factory.create(&archive).expect("sink");
    open_and_drain(sink.as_ref(), &archive);

    assert!(matches!(sink.image(1, 0), Err(SinkError::LoadError(_))));
    // The failure is local: other pages and the sink stay usable.
    assert_eq!(sink.image(0, 0).expect("good page").pixels()[0], 1);
    assert_eq!(sink.open_state(), OpenState::Open);
}
