//! Rodio-backed alert sound playback.
//!
//! The `OutputStream` is not `Send`, so a keeper thread owns it for the
//! lifetime of the process and hands back a cloneable handle. Sinks are
//! created per alert on the caller's thread; replacing or dropping a sink
//! stops its sound. Audio failures never take the notifier down, the
//! visual alert still goes out.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::warn;

use doorwatch_core::AudioSink;

pub struct RodioSink {
    handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
}

impl RodioSink {
    /// Open the default audio device. A missing device degrades to a
    /// silent sink rather than an error.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("doorwatch-audio".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = tx.send(Some(handle));
                    // The stream must outlive every sink built on it.
                    let _stream = stream;
                    loop {
                        thread::park();
                    }
                }
                Err(err) => {
                    warn!(?err, "audio output unavailable, alert sounds disabled");
                    let _ = tx.send(None);
                }
            });

        let handle = match spawned {
            Ok(_) => rx.recv().ok().flatten(),
            Err(err) => {
                warn!(?err, "failed to start audio thread, alert sounds disabled");
                None
            }
        };

        Self { handle, sink: None }
    }
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for RodioSink {
    fn play(&mut self, path: &Path, volume: f32, looped: bool) {
        self.stop();

        let Some(ref handle) = self.handle else {
            return;
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(?err, path = %path.display(), "failed opening sound file");
                return;
            }
        };
        let decoder = match Decoder::new(BufReader::new(file)) {
            Ok(decoder) => decoder,
            Err(err) => {
                warn!(?err, path = %path.display(), "failed decoding sound file");
                return;
            }
        };

        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.set_volume(volume);
                if looped {
                    sink.append(decoder.repeat_infinite());
                } else {
                    sink.append(decoder);
                }
                self.sink = Some(sink);
            }
            Err(err) => {
                warn!(?err, "failed to create audio sink");
            }
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.empty())
    }
}
