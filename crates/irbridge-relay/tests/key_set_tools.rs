//! Learning a remote into a key-set directory, then identifying a key against that directory.

use irbridge_core::domain::protocol::{NEC, RC6};
use irbridge_core::{KeyEntry, KeyEvent, KeySet, KeySource, Signal};
use irbridge_relay::application::key_sets::{learn_keyset, identify_key};
use irbridge_relay::infrastructure::storage::keyset_file::{
    list_keysets, load_keyset, save_keyset,
};
use irbridge_relay::infrastructure::transceiver::MockTransceiver;
use uuid::Uuid;

#[tokio::test]
async fn test_learned_remote_is_identified_by_its_keys() {
    // Arrange: a directory that already knows the hi-fi remote.
    let dir = std::env::temp_dir().join(format!("irbridge_tools_{}", Uuid::new_v4()));
    let mut hifi = KeySet::new("DAEWOO_HIFI", NEC, 32);
    hifi.add_key(KeyEntry::new("POWER", "E0E040BF")).unwrap();
    hifi.add_key(KeyEntry::new("VOL_UP", "E0E0E01F")).unwrap();
    save_keyset(&dir.join("hifi.toml"), &hifi).unwrap();

    let device = MockTransceiver::new();
    device.push_signal(Signal::new(RC6, "1000C", 20));
    device.push_signal(Signal::new(RC6, "10010", 20));

    // Act: learn the DVD remote with the hi-fi key names, then press POWER.
    let dvd = learn_keyset(&device, &hifi, "PHILIPS_DVP3350", |_| {})
        .await
        .unwrap();
    save_keyset(&dir.join("dvd.toml"), &dvd).unwrap();

    device.push_signal(Signal::new(RC6, "1000C", 20));
    let stored = list_keysets(&dir).unwrap();
    let result = identify_key(&device, &stored, "POWER", KeyEvent::Press)
        .await
        .unwrap();

    // Assert
    let reloaded = load_keyset(&dir.join("dvd.toml")).unwrap();
    assert_eq!(reloaded.available_keys(), vec!["POWER", "VOL_UP"]);
    assert_eq!(reloaded.key_press("VOL_UP").unwrap(), Signal::new(RC6, "10010", 20));
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].name, "dvd");
    assert_eq!(result.matches[0].set.device_name, "PHILIPS_DVP3350");

    std::fs::remove_dir_all(&dir).ok();
}
