pub mod alarm_tone;

use alarm_tone::AlarmTone;

use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Receives playback faults raised on the audio thread.
pub type FaultHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Something that can sound the operator alarm.
///
/// `play` must not block on the output device; faults that only surface on the
/// device go to the registered fault handler.
pub trait AlarmSink: Send + Sync {
    fn play(&self) -> Result<(), String>;
    fn silence(&self);
    fn set_fault_handler(&self, handler: Option<FaultHandler>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmSound {
    /// Generated siren.
    Tone,
    /// Any file rodio can decode (mp3, wav, ogg, flac).
    File(PathBuf),
}

enum AlarmCommand {
    Play,
    Silence,
    SetVolume(f32),
}

/// Handle on the dedicated `alarm-audio` thread that owns the output device.
pub struct AlarmEngineHandle {
    tx: Arc<Mutex<Option<Sender<AlarmCommand>>>>,
    sound: AlarmSound,
    volume: f32,
    fault_handler: Arc<Mutex<Option<FaultHandler>>>,
}

impl AlarmEngineHandle {
    pub fn new(sound: AlarmSound, volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            sound,
            volume: volume.clamp(0.0, 1.0),
            fault_handler: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AlarmCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AlarmCommand>();
        let sound = self.sound.clone();
        let mut volume = self.volume;
        let fault_handler = Arc::clone(&self.fault_handler);

        // OutputStream and Sink are not Send; they live and die on this thread.
        thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                let report = |message: String| {
                    log::error!("alarm playback failed: {message}");
                    let handler = fault_handler.lock().ok().and_then(|guard| guard.clone());
                    if let Some(handler) = handler {
                        handler(message);
                    }
                };

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                    volume: f32,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to open audio output: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        new_sink.set_volume(volume);
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AlarmCommand::Play => {
                            if let Err(message) = ensure_sink(&mut _stream, &mut sink, volume) {
                                report(message);
                                continue;
                            }
                            let Some(ref s) = sink else { continue };
                            // A sounding alarm keeps playing; it is not restarted.
                            if !s.empty() {
                                continue;
                            }
                            match &sound {
                                AlarmSound::Tone => s.append(AlarmTone::default()),
                                AlarmSound::File(path) => match open_sound_file(path) {
                                    Ok(source) => s.append(source),
                                    Err(message) => report(message),
                                },
                            }
                            s.play();
                        }
                        AlarmCommand::Silence => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                        }
                        AlarmCommand::SetVolume(v) => {
                            volume = v.clamp(0.0, 1.0);
                            if let Some(ref s) = sink {
                                s.set_volume(volume);
                            }
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AlarmCommand::SetVolume(volume))
            .map_err(|e| e.to_string())
    }
}

fn open_sound_file(path: &PathBuf) -> Result<Decoder<BufReader<File>>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Cannot open alarm sound {}: {}", path.display(), e))?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Cannot decode alarm sound {}: {}", path.display(), e))
}

impl AlarmSink for AlarmEngineHandle {
    fn play(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AlarmCommand::Play).map_err(|e| e.to_string())
    }

    fn silence(&self) {
        // Never spawn the audio thread just to silence it.
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AlarmCommand::Silence);
        }
    }

    fn set_fault_handler(&self, handler: Option<FaultHandler>) {
        match self.fault_handler.lock() {
            Ok(mut guard) => *guard = handler,
            Err(poisoned) => *poisoned.into_inner() = handler,
        }
    }
}
