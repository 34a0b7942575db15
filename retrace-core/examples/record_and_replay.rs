//! Record a small document and replay it into an in-process renderer
//!
//! Run with `RETRACE_LOG=debug` to see every flushed batch and the renderer
//! log messages relayed by the bridge.

use retrace_core::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    println!("🎬 Record and Replay Example");
    println!("============================\n");

    let config = ConfigBuilder::new()
        .default_privacy_level(PrivacyLevel::MaskUserInput)
        .build()?;
    let bus = RecordBus::from_config(&config.bus);

    // The renderer: reports ready on startup, then prints what it receives
    let (renderer, mut endpoint) = renderer_channel(config.playback.sandbox_origin.clone());
    let renderer_task = tokio::spawn(async move {
        endpoint.post(&BridgeUpMessage::Log {
            level: "info".to_string(),
            message: "renderer booted".to_string(),
        })?;
        endpoint.post(&BridgeUpMessage::Ready)?;

        let mut received = 0;
        while let Some(BridgeDownMessage::Records { records, .. }) = endpoint.recv().await {
            for record in records {
                received += 1;
                println!(
                    "  ← #{} {:?} {}",
                    record.order_id,
                    record.record.record_type(),
                    record
                        .record
                        .incremental_source()
                        .map(|source| format!("({:?})", source))
                        .unwrap_or_default()
                );
            }
        }
        Ok::<usize, RetraceError>(received)
    });

    let playback = start_playback(renderer, &bus, config.playback.clone(), |status| {
        println!("  ⟳ playback {}", status);
    });

    // A checkout form living in a shadow root
    let mut doc = Document::new("https://shop.example.test/checkout");
    let host = doc.create_element("checkout-form");
    let body = doc.body();
    doc.append_child(body, host);
    let shadow = doc.attach_shadow(host);
    doc.set_adopted_style_sheets(
        shadow,
        vec![StyleSheet::new(vec![CssRule::style("input { border: 1px solid; }")])],
    );
    let input = doc.create_element("input");
    doc.append_child(shadow, input);

    println!("Recording...");
    let mut recorder = start_recording(&mut doc, config.recorder.clone(), bus.clone());
    let mut ticker = tokio::time::interval(config.recorder.flush_interval);
    ticker.tick().await;

    let steps: [fn(&mut Document, NodeKey); 3] = [
        |doc, input| doc.set_value(input, "4111 1111 1111 1111"),
        |doc, _| {
            let note = doc.create_text("Thanks for your order");
            let body = doc.body();
            doc.append_child(body, note);
        },
        |doc, _| doc.resize(800, 600),
    ];
    for step in steps {
        step(&mut doc, input);
        ticker.tick().await;
        recorder.flush(&mut doc);
    }

    recorder.stop(&mut doc);
    ticker.tick().await;
    playback.stop();
    playback.join().await;

    let received = renderer_task
        .await
        .map_err(|e| RetraceError::Other(e.to_string()))??;
    println!("\n✓ Renderer received {} record(s)", received);

    Ok(())
}
