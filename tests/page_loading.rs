mod common;

use std::sync::Arc;
use std::time::Duration;

use comic_pager::page_loader::{LoadedFrom, LoaderConfig, LocalComicHandler, PageError, RequestKey};
use comic_pager::pipeline::{BindingTicket, ImagePipeline};
use comic_pager::page_source::PageSource;
use common::{CountingPages, gray_png_bytes, jpeg_bytes, png_bytes, wait_for};

fn handler_for(source: &Arc<CountingPages>, target: u32) -> LocalComicHandler {
    LocalComicHandler::new(source.clone(), &LoaderConfig::default().with_target_size(target))
}

#[test]
fn twelve_page_comic_page_three_decodes_to_750x500() {
    let source = Arc::new(CountingPages::repeated(jpeg_bytes(3000, 2000), 12));
    let handler = handler_for(&source, 1080);

    let key = handler.key_for(3);
    assert_eq!(key.as_str(), "localcomic://#3");
    assert!(handler.can_handle(&key));
    assert_eq!(key.page_index(), Ok(3));

    let page = handler.load(&key).expect("page 3 should decode");

    assert_eq!(page.source_size, (3000, 2000));
    assert_eq!(page.sample_size, 4);
    assert_eq!(page.dimensions(), (750, 500));
    assert_eq!(page.loaded_from, LoadedFrom::Disk);
    assert_eq!(source.opens(), 2);
    assert_eq!(source.closes(), 2);
}

#[test]
fn png_page_above_pixel_cap_is_sampled_instead_of_rejected() {
    let source = Arc::new(CountingPages::new(vec![gray_png_bytes(6500, 6500)]));
    let config = LoaderConfig::for_display(1080, 540);
    assert!(6500u64 * 6500 > config.max_decoded_pixels);
    let handler = LocalComicHandler::new(source.clone(), &config);

    let page = handler.load(&handler.key_for(0)).expect("large png should be sampled");

    assert_eq!(page.sample_size, 4);
    assert_eq!(page.dimensions(), (1625, 1625));
    assert!(page.width().max(page.height()) <= 2160);
    assert_eq!(source.opens(), 2);
    assert_eq!(source.closes(), 2);
}

#[test]
fn corrupt_page_fails_with_decode_error_and_closes_stream() {
    let source = Arc::new(CountingPages::new(vec![b"definitely not an image".to_vec()]));
    let handler = handler_for(&source, 1080);

    let result = handler.load(&handler.key_for(0));

    assert!(matches!(result, Err(PageError::Decode(_))));
    assert!(source.opens() >= 1);
    assert_eq!(source.opens(), source.closes());
}

#[test]
fn truncated_page_closes_every_stream() {
    let mut bytes = jpeg_bytes(640, 480);
    bytes.truncate(bytes.len() / 3);
    let source = Arc::new(CountingPages::new(vec![bytes]));
    let handler = handler_for(&source, 100);

    assert!(handler.load(&handler.key_for(0)).is_err());
    assert_eq!(source.opens(), source.closes());
}

#[test]
fn out_of_range_index_never_opens_a_stream() {
    let source = Arc::new(CountingPages::repeated(png_bytes(8, 8), 12));
    let handler = handler_for(&source, 1080);

    let result = handler.load(&handler.key_for(12));

    assert_eq!(result.err(), Some(PageError::PageIndexOutOfRange { index: 12, count: 12 }));
    assert_eq!(source.opens(), 0);
}

#[test]
fn concurrent_requests_share_one_decode() {
    let source = Arc::new(CountingPages::repeated(jpeg_bytes(800, 600), 4).with_open_delay(Duration::from_millis(30)));
    let config = LoaderConfig::default().with_target_size(200);
    let pipeline = Arc::new(
        ImagePipeline::builder()
            .config(&config)
            .handler(LocalComicHandler::new(source.clone(), &config))
            .build()
            .expect("pipeline should build"),
    );
    let key = RequestKey::local_page(1);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let key = key.clone();
            std::thread::spawn(move || pipeline.load_blocking(&key))
        })
        .collect();

    for worker in workers {
        let delivery = worker
            .join()
            .expect("worker should not panic")
            .expect("load should succeed");
        assert_eq!(delivery.page.dimensions(), (200, 150));
    }

    assert_eq!(source.opens(), 2);
    assert_eq!(source.closes(), 2);
    assert_eq!(pipeline.cache_stats().misses, 1);
}

#[test]
fn callbacks_and_cache_hits_are_reported() {
    let source = Arc::new(CountingPages::repeated(png_bytes(64, 32), 3));
    let config = LoaderConfig::default().with_target_size(32);
    let pipeline = ImagePipeline::builder()
        .config(&config)
        .handler(LocalComicHandler::new(source.clone(), &config))
        .build()
        .expect("pipeline should build");

    let delivered = Arc::new(std::sync::Mutex::new(Vec::new()));
    for _ in 0..2 {
        let sink = Arc::clone(&delivered);
        pipeline.request(RequestKey::local_page(2), BindingTicket::detached(), move |result| {
            sink.lock().expect("sink lock").push(result);
        });
        wait_for("callback", || !delivered.lock().expect("sink lock").is_empty());
        let result = delivered.lock().expect("sink lock").pop().expect("one delivery");
        assert_eq!(result.expect("load should succeed").page.dimensions(), (32, 16));
    }

    let stats = pipeline.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.size_bytes, 32 * 16 * 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_works_from_async_context() {
    let source = Arc::new(CountingPages::repeated(png_bytes(100, 50), 2));
    let config = LoaderConfig::default().with_target_size(50);
    let pipeline = ImagePipeline::builder()
        .config(&config)
        .handler(LocalComicHandler::new(source.clone(), &config))
        .build()
        .expect("pipeline should build");

    let first = pipeline.fetch(&RequestKey::local_page(0)).await.expect("fetch should succeed");
    let second = pipeline.fetch(&RequestKey::local_page(0)).await.expect("fetch should succeed");

    assert_eq!(first.loaded_from, LoadedFrom::Disk);
    assert_eq!(second.loaded_from, LoadedFrom::Memory);
    assert_eq!(first.page.dimensions(), (50, 25));

    pipeline.shutdown();
    assert_eq!(pipeline.fetch(&RequestKey::local_page(1)).await.err(), Some(PageError::Shutdown));
}

#[test]
fn disposed_source_fails_only_uncached_requests() {
    let source = Arc::new(CountingPages::repeated(png_bytes(40, 40), 3));
    let config = LoaderConfig::default().with_target_size(20);
    let pipeline = ImagePipeline::builder()
        .config(&config)
        .handler(LocalComicHandler::new(source.clone(), &config))
        .build()
        .expect("pipeline should build");

    pipeline
        .load_blocking(&RequestKey::local_page(0))
        .expect("load before dispose");
    source.dispose().expect("dispose should succeed");

    let result = pipeline.load_blocking(&RequestKey::local_page(1));
    assert_eq!(result.err(), Some(PageError::SourceDisposed));

    // 已缓存页面与管线本身不受影响。
    let cached = pipeline
        .load_blocking(&RequestKey::local_page(0))
        .expect("cached page is still served");
    assert_eq!(cached.loaded_from, LoadedFrom::Memory);
    assert!(!pipeline.is_shutdown());
    assert_eq!(
        pipeline.load_blocking(&RequestKey::local_page(2)).err(),
        Some(PageError::SourceDisposed)
    );
}
