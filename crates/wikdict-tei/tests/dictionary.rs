use wikdict_store::{KeyPolicy, OffsetPolicy, build, verify_pair};
use wikdict_tei::TeiEntries;

const TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0"><text><body>
  <entry>
    <form><orth>Chat</orth><pron>ʃa</pron></form>
    <gramGrp><pos>n</pos><gen>masc</gen></gramGrp>
    <sense><cit type="trans"><quote>cat</quote></cit></sense>
  </entry>
  <entry>
    <form><orth>OTAN</orth></form>
    <gramGrp><pos>prop</pos></gramGrp>
    <sense><cit type="trans"><quote>NATO</quote></cit></sense>
  </entry>
  <entry>
    <form><orth>chat</orth></form>
    <gramGrp><pos>n</pos></gramGrp>
    <sense><cit type="trans"><quote>chat</quote></cit><def>online talk</def></sense>
  </entry>
  <entry><form><orth>rien</orth></form></entry>
</body></text></TEI>"#;

#[test]
fn dictionary_pair_folds_keys_and_keeps_acronyms() {
    let mut entries = TeiEntries::new(TEI.as_bytes());
    let canonical = entries
        .by_ref()
        .map(|entry| entry.map(|e| e.to_entry()))
        .collect::<anyhow::Result<Vec<_>>>()
        .expect("parse");
    assert_eq!(entries.stats().dropped_no_translation, 1);

    let (primary, slots) = build(canonical, OffsetPolicy::PerEntry).expect("build");
    let primary_text = String::from_utf8(primary.clone()).unwrap();
    assert_eq!(
        primary_text,
        "Chat\tn\tm\tʃa\tcat\t\n\
         OTAN\tprop\t\t\tNATO\t\n\
         chat\tn\t\t\tchat\tonline talk\n"
    );

    let keys: Vec<&str> = slots.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["OTAN", "chat", "chat"]);
    let offsets: Vec<u64> = slots.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, vec![18, 0, 36]);
    assert!(slots.iter().all(|s| s.length.is_some()));

    let index: String = slots.iter().map(|s| s.to_line()).collect();
    let report = verify_pair(&primary, index.as_bytes(), KeyPolicy::FoldCase).expect("verify");
    assert_eq!(report.slots, 3);
    assert_eq!(report.distinct_keys, 2);
}
