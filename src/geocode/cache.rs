use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::bounds::LatLng;

/// Nowa przestrzeń nazw unieważnia stare, niezgodne wpisy.
pub const CACHE_NAMESPACE: &str = "geoCache-v3";

/// Trwały magazyn klucz -> tekst (jeden klucz na cały cache).
pub trait CacheStore: Send {
    fn load(&self, namespace: &str) -> Option<String>;
    fn save(&mut self, namespace: &str, payload: &str) -> io::Result<()>;
}

/// Jeden plik JSON na przestrzeń nazw w katalogu cache.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }
}

impl CacheStore for FileStore {
    fn load(&self, namespace: &str) -> Option<String> {
        fs::read_to_string(self.path(namespace)).ok()
    }

    fn save(&mut self, namespace: &str, payload: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{namespace}.json.tmp"));
        fs::write(&tmp, payload)?;
        fs::rename(tmp, self.path(namespace))
    }
}

/// Magazyn w pamięci; klony dzielą zawartość. `failing()` odrzuca zapisy.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }

    pub fn with_payload(namespace: &str, payload: &str) -> Self {
        let store = Self::default();
        if let Ok(mut slots) = store.slots.lock() {
            slots.insert(namespace.to_string(), payload.to_string());
        }
        store
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, namespace: &str) -> Option<String> {
        self.slots.lock().ok()?.get(namespace).cloned()
    }

    fn save(&mut self, namespace: &str, payload: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::other("quota exceeded"));
        }
        self.slots
            .lock()
            .map_err(|_| io::Error::other("store poisoned"))?
            .insert(namespace.to_string(), payload.to_string());
        Ok(())
    }
}

struct StoreSlot {
    store: Box<dyn CacheStore>,
    saved_revision: u64,
}

/// Zapis stanu cache, wykonywany już po zwolnieniu blokady cache.
pub struct PendingWrite {
    slot: Arc<Mutex<StoreSlot>>,
    revision: u64,
    payload: String,
}

impl PendingWrite {
    /// Blokujący zapis; starsza wersja nie nadpisuje nowszej.
    pub fn write(self) {
        let Ok(mut slot) = self.slot.lock() else {
            return;
        };
        if self.revision <= slot.saved_revision {
            debug!("Skipping stale geocode cache write {}", self.revision);
            return;
        }
        // cache to tylko optymalizacja: błąd zapisu ignorujemy
        match slot.store.save(CACHE_NAMESPACE, &self.payload) {
            Ok(()) => slot.saved_revision = self.revision,
            Err(e) => debug!("Geocode cache not persisted: {}", e),
        }
    }
}

/// Cache współrzędnych: `"{region}|{miasto}"` -> punkt zaokrąglony do 5 miejsc.
pub struct GeocodeCache {
    entries: BTreeMap<String, LatLng>,
    slot: Arc<Mutex<StoreSlot>>,
    revision: u64,
}

impl GeocodeCache {
    /// Wczytuje zapisany stan; cokolwiek nieczytelnego = pusty cache.
    pub fn open(store: Box<dyn CacheStore>) -> Self {
        let entries = store
            .load(CACHE_NAMESPACE)
            .and_then(|payload| match serde_json::from_str::<BTreeMap<String, LatLng>>(&payload) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!("Ignoring unreadable geocode cache: {}", e);
                    None
                }
            })
            .unwrap_or_default();
        debug!("Geocode cache opened with {} entries", entries.len());
        Self {
            entries,
            slot: Arc::new(Mutex::new(StoreSlot { store, saved_revision: 0 })),
            revision: 0,
        }
    }

    pub fn key(region_key: &str, place_key: &str) -> String {
        format!("{region_key}|{place_key}")
    }

    pub fn get(&self, region_key: &str, place_key: &str) -> Option<LatLng> {
        self.entries.get(&Self::key(region_key, place_key)).copied()
    }

    /// Zapisuje punkt (ostatni zapis wygrywa) i od razu utrwala; zwraca wartość przechowaną.
    pub fn set(&mut self, region_key: &str, place_key: &str, lat: f64, lng: f64) -> LatLng {
        let (stored, write) = self.stage(region_key, place_key, lat, lng);
        if let Some(write) = write {
            write.write();
        }
        stored
    }

    /// Jak [`Self::set`], ale utrwalenie zostaje po stronie wołającego.
    pub fn stage(&mut self, region_key: &str, place_key: &str, lat: f64, lng: f64) -> (LatLng, Option<PendingWrite>) {
        let stored = LatLng::new(lat, lng).rounded();
        self.entries.insert(Self::key(region_key, place_key), stored);
        self.revision += 1;
        let write = match serde_json::to_string(&self.entries) {
            Ok(payload) => Some(PendingWrite { slot: self.slot.clone(), revision: self.revision, payload }),
            Err(e) => {
                debug!("Geocode cache not serialized: {}", e);
                None
            }
        };
        (stored, write)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
