use chrono::{DateTime, TimeZone, Utc};
use graphwire::{
    encoding::{decode_with, encode_with},
    prelude::*,
};
use graphwire_strategy::*;
use proptest::prelude::*;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

const TAGS: TypeId = 65;
const SCORES: TypeId = 66;
const MEMBERS: TypeId = 67;
const BADGES: TypeId = 68;

#[derive(Default)]
struct Person {
    name: String,
    age: i32,
    friend: Option<Shared<Person>>,
    tags: Option<Shared<Vec<String>>>,
    born: Option<DateTime<Utc>>,
    // written from version 2 on
    nickname: String,
}

impl Transportable for Person {
    const TYPE_ID: TypeId = 64;
}

struct PersonSerializer;

impl ObjectSerializer for PersonSerializer {
    type Target = Person;

    fn write_fields(&self, p: &Person, out: &mut dyn WireOutput, version: i64) -> Result<()> {
        out.put_str("name", &p.name)?;
        out.put_i32("age", p.age)?;
        out.put_shared("friend", p.friend.as_ref())?;
        out.put_container("tags", p.tags.as_ref(), TAGS)?;
        out.put_date("born", p.born.as_ref())?;
        if version >= 2 {
            out.put_str("nickname", &p.nickname)?;
        }
        Ok(())
    }

    fn read_fields(&self, p: &Shared<Person>, input: &mut dyn WireInput, version: i64) -> Result<()> {
        let name = input.get_str("name")?;
        let age = input.get_i32("age")?;
        let friend = input.get_shared::<Person>("friend")?;
        let tags = input.get_container("tags", TAGS)?;
        let born = input.get_date("born")?;
        let nickname = if version >= 2 { input.get_str("nickname")? } else { String::new() };
        let mut p = p.borrow_mut();
        p.name = name;
        p.age = age;
        p.friend = friend;
        p.tags = tags;
        p.born = born;
        p.nickname = nickname;
        Ok(())
    }
}

#[derive(Default)]
struct Team {
    members: Option<Shared<Vec<Shared<Person>>>>,
    scores: Option<Shared<HashMap<String, i32>>>,
    badges: Option<Shared<HashSet<i64>>>,
}

impl Transportable for Team {
    const TYPE_ID: TypeId = 69;
}

struct TeamSerializer;

impl ObjectSerializer for TeamSerializer {
    type Target = Team;

    fn write_fields(&self, t: &Team, out: &mut dyn WireOutput, _: i64) -> Result<()> {
        out.put_container("members", t.members.as_ref(), MEMBERS)?;
        out.put_container("scores", t.scores.as_ref(), SCORES)?;
        out.put_container("badges", t.badges.as_ref(), BADGES)
    }

    fn read_fields(&self, t: &Shared<Team>, input: &mut dyn WireInput, _: i64) -> Result<()> {
        let members = input.get_container("members", MEMBERS)?;
        let scores = input.get_container("scores", SCORES)?;
        let badges = input.get_container("badges", BADGES)?;
        let mut t = t.borrow_mut();
        t.members = members;
        t.scores = scores;
        t.badges = badges;
        Ok(())
    }

    fn prepare_fields(&self, t: &Team, input: &mut dyn WireInput, _: i64) -> Result<()> {
        input.prepare_container(t.members.as_ref(), MEMBERS)
    }
}

fn registry() -> Arc<TypeRegistry> {
    TypeRegistry::builder()
        .register(ObjectAdapter::arc(PersonSerializer))
        .register(ObjectAdapter::arc(TeamSerializer))
        .register(Arc::new(
            ListSerializer::<String>::with_type_args(TAGS, &[TypeArg::of::<String>()]).unwrap(),
        ))
        .register(Arc::new(MapSerializer::<String, i32>::new(SCORES)))
        .register(Arc::new(ListSerializer::<Shared<Person>>::new(MEMBERS)))
        .register(Arc::new(SetSerializer::<i64>::new(BADGES)))
        .build()
        .unwrap()
}

fn person(name: &str, age: i32) -> Shared<Person> {
    shared(Person {
        name: name.into(),
        age,
        ..Person::default()
    })
}

const FORMATS: [WireFormat; 2] = [WireFormat::Text, WireFormat::Binary];

#[test]
fn exact_text_in_member_order() {
    let ann = person("Ann", 30);
    {
        let mut a = ann.borrow_mut();
        a.tags = Some(shared(vec!["a".to_string(), "b".to_string()]));
        a.born = Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());
    }
    let text = encode_value(&registry(), WireFormat::Text, &ann, 1).unwrap();
    assert_eq!(
        std::str::from_utf8(&text).unwrap(),
        r#"{"_typeId":64,"name":"Ann","age":30,"friend":null,"tags":["a","b"],"born":"2020-01-02T03:04:05.000Z"}"#
    );
}

#[test]
fn shared_value_is_written_once() {
    let carol = person("Carol", 50);
    let team = shared(Team {
        members: Some(shared(vec![
            shared(Person {
                friend: Some(carol.clone()),
                ..Person::default()
            }),
            shared(Person {
                friend: Some(carol.clone()),
                ..Person::default()
            }),
        ])),
        ..Team::default()
    });

    let text = encode_value(&registry(), WireFormat::Text, &team, 1).unwrap();
    let text = std::str::from_utf8(&text).unwrap();
    assert_eq!(text.matches("\"Carol\"").count(), 1);
    // team 1, members list 2, first member 3, carol 4
    assert_eq!(text.matches(r#"{"*i":-4}"#).count(), 1);

    for format in &FORMATS {
        let bytes = encode_value(&registry(), *format, &team, 1).unwrap();
        let back = decode_value::<Team>(&registry(), *format, &bytes, 1).unwrap().unwrap();
        let back = back.borrow();
        let members = back.members.as_ref().unwrap().borrow();
        let first = members[0].borrow().friend.clone().unwrap();
        let second = members[1].borrow().friend.clone().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.borrow().name, "Carol");
    }
}

#[test]
fn self_reference_round_trips() {
    let narcissus = person("Narcissus", 20);
    narcissus.borrow_mut().friend = Some(narcissus.clone());

    let text = encode_value(&registry(), WireFormat::Text, &narcissus, 1).unwrap();
    assert_eq!(
        std::str::from_utf8(&text).unwrap(),
        r#"{"_typeId":64,"name":"Narcissus","age":20,"friend":{"*i":-1},"tags":null,"born":null}"#
    );

    for format in &FORMATS {
        let bytes = encode_value(&registry(), *format, &narcissus, 1).unwrap();
        let back = decode_value::<Person>(&registry(), *format, &bytes, 1).unwrap().unwrap();
        let friend = back.borrow_mut().friend.take().unwrap();
        assert!(Rc::ptr_eq(&friend, &back));
    }
    narcissus.borrow_mut().friend = None;
}

#[test]
fn self_containing_list() {
    let list = shared(Vec::<Option<Obj>>::new());
    let obj = Obj::from_shared(list.clone());
    list.borrow_mut().push(Some(obj.clone()));
    list.borrow_mut().push(None);

    for format in &FORMATS {
        let bytes = encode(&registry(), *format, Some(&obj), 1).unwrap();
        let back = decode(&registry(), *format, &bytes, 1).unwrap().unwrap();
        let items = back.downcast::<Vec<Option<Obj>>>().unwrap();
        let first = items.borrow()[0].clone().unwrap();
        assert!(first.ptr_eq(&back));
        assert!(items.borrow()[1].is_none());
        items.borrow_mut().clear();
    }
    list.borrow_mut().clear();
}

#[test]
fn containers_round_trip_in_both_formats() {
    let mut scores = HashMap::new();
    scores.insert("north".to_string(), 3);
    scores.insert("south".to_string(), -7);
    let team = shared(Team {
        members: Some(shared(vec![person("Dee", 41)])),
        scores: Some(shared(scores.clone())),
        badges: Some(shared([1i64, 2, 3].iter().copied().collect())),
    });

    for format in &FORMATS {
        let bytes = encode_value(&registry(), *format, &team, 1).unwrap();
        let back = decode_value::<Team>(&registry(), *format, &bytes, 1).unwrap().unwrap();
        let back = back.borrow();
        assert_eq!(*back.scores.as_ref().unwrap().borrow(), scores);
        assert_eq!(back.badges.as_ref().unwrap().borrow().len(), 3);
        assert_eq!(back.members.as_ref().unwrap().borrow()[0].borrow().age, 41);
    }
}

#[test]
fn odd_map_items_are_corrupt() {
    let text = br#"{"_typeId":69,"members":null,"scores":["x",1,"y"],"badges":null}"#;
    let err = decode(&registry(), WireFormat::Text, text, 1).unwrap_err();
    assert!(err.is_corrupt());
}

#[test]
fn version_decides_fields() {
    let bob = person("Bob", 7);
    bob.borrow_mut().nickname = "bobby".into();

    let v1 = encode_value(&registry(), WireFormat::Text, &bob, 1).unwrap();
    let v2 = encode_value(&registry(), WireFormat::Text, &bob, 2).unwrap();
    assert!(!std::str::from_utf8(&v1).unwrap().contains("nickname"));
    assert!(std::str::from_utf8(&v2).unwrap().ends_with(r#","nickname":"bobby"}"#));

    // an older reader ignores the member, a newer one reads a missing member as empty
    let old = decode_value::<Person>(&registry(), WireFormat::Text, &v2, 1).unwrap().unwrap();
    assert_eq!(old.borrow().nickname, "");
    assert_eq!(old.borrow().age, 7);
    let new = decode_value::<Person>(&registry(), WireFormat::Text, &v1, 2).unwrap().unwrap();
    assert_eq!(new.borrow().nickname, "");

    let bin = encode_value(&registry(), WireFormat::Binary, &bob, 2).unwrap();
    let back = decode_value::<Person>(&registry(), WireFormat::Binary, &bin, 2).unwrap().unwrap();
    assert_eq!(back.borrow().nickname, "bobby");
}

#[test]
fn size_matches_binary_body() {
    let ann = person("Ann", 30);
    let registry = registry();
    let ser = registry.get(64).unwrap();
    let obj = Obj::from_shared(ann.clone());
    let bytes = encode_value(&registry, WireFormat::Binary, &ann, 1).unwrap();
    // the message adds the 4-byte tag in front of the body
    assert_eq!(ser.size(&obj, &registry, 1).unwrap(), bytes.len() - 4);
}

#[test]
fn lazy_streams_are_collected() {
    let stream = Obj::new(LazyStream::new(9, "text/plain", 5));
    let ready = Obj::new(LazyStream::with_payload(10, "text/plain", Bytes::from_static(b"hi")));
    let inner = shared(vec![Some(stream.clone()), Some(ready)]);
    let outer = shared(vec![
        Some(stream),
        Some(Obj::from_shared(inner)),
        None,
    ]);

    for format in &FORMATS {
        let bytes = encode_value(&registry(), *format, &outer, 1).unwrap();
        let (root, deferred) = decode_lazy(&registry(), *format, &bytes, 1).unwrap();
        assert!(root.is_some());
        // payloads never travel in the message, so both decoded streams are pending
        let ids: Vec<i64> = deferred.iter().map(|s| s.borrow().stream_id).collect();
        assert_eq!(ids, vec![9, 10]);

        deferred[0].borrow_mut().materialize(Bytes::from_static(b"hello")).unwrap();
        assert!(deferred[0].borrow().is_materialized());
    }
}

#[test]
fn text_and_binary_agree() {
    let a = person("A", 1);
    let b = person("B", 2);
    a.borrow_mut().friend = Some(b.clone());
    b.borrow_mut().tags = Some(shared(vec!["x".to_string()]));

    let decoded: Vec<(String, i32, String)> = FORMATS
        .iter()
        .map(|format| {
            let bytes = encode_value(&registry(), *format, &a, 1).unwrap();
            let back = decode_value::<Person>(&registry(), *format, &bytes, 1).unwrap().unwrap();
            let back = back.borrow();
            let friend = back.friend.as_ref().unwrap().borrow();
            let tag = friend.tags.as_ref().unwrap().borrow()[0].clone();
            (back.name.clone(), friend.age, tag)
        })
        .collect();
    assert_eq!(decoded[0], decoded[1]);
    assert_eq!(decoded[0], ("A".to_string(), 2, "x".to_string()));
}

#[test]
fn binary_nesting_is_bounded() {
    let registry = TypeRegistry::builder().build().unwrap();
    let inner = Obj::new(Vec::<Option<Obj>>::new());
    let middle = Obj::new(vec![Some(inner)]);
    let outer = Obj::new(vec![Some(middle)]);
    let bytes = encode(&registry, WireFormat::Binary, Some(&outer), 1).unwrap();

    // each list takes one level for its tag and one for its items
    let fits = WireConfig::default().with_max_depth(6);
    assert!(decode_with(&registry, WireFormat::Binary, &bytes, 1, &fits).is_ok());

    let too_shallow = WireConfig::default().with_max_depth(5);
    let err = decode_with(&registry, WireFormat::Binary, &bytes, 1, &too_shallow).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert!(err.message().contains("5 levels"));

    let err = encode_with(&registry, WireFormat::Binary, Some(&outer), 1, &too_shallow).unwrap_err();
    assert!(err.is_internal());
}

#[derive(Clone, Debug, Default)]
struct Sample {
    flag: bool,
    tiny: i8,
    short: i16,
    int: i32,
    long: i64,
    single: f32,
    double: f64,
    letter: char,
    blob: Bytes,
    when: Option<DateTime<Utc>>,
}

impl Transportable for Sample {
    const TYPE_ID: TypeId = 70;
}

struct SampleSerializer;

impl ObjectSerializer for SampleSerializer {
    type Target = Sample;

    fn write_fields(&self, s: &Sample, out: &mut dyn WireOutput, _: i64) -> Result<()> {
        out.put_bool("flag", s.flag)?;
        out.put_i8("tiny", s.tiny)?;
        out.put_i16("short", s.short)?;
        out.put_i32("int", s.int)?;
        out.put_i64("long", s.long)?;
        out.put_f32("single", s.single)?;
        out.put_f64("double", s.double)?;
        out.put_char("letter", s.letter)?;
        out.put_bytes("blob", &s.blob)?;
        out.put_date("when", s.when.as_ref())
    }

    fn read_fields(&self, s: &Shared<Sample>, input: &mut dyn WireInput, _: i64) -> Result<()> {
        let mut s = s.borrow_mut();
        s.flag = input.get_bool("flag")?;
        s.tiny = input.get_i8("tiny")?;
        s.short = input.get_i16("short")?;
        s.int = input.get_i32("int")?;
        s.long = input.get_i64("long")?;
        s.single = input.get_f32("single")?;
        s.double = input.get_f64("double")?;
        s.letter = input.get_char("letter")?;
        s.blob = input.get_bytes("blob")?;
        s.when = input.get_date("when")?;
        Ok(())
    }
}

fn arb_sample() -> impl Strategy<Value = Sample> {
    (
        (any::<bool>(), any::<i8>(), any::<i16>(), any::<i32>(), any::<i64>()),
        (any::<f32>(), any::<f64>(), any::<char>()),
        (arb_bytes(), prop::option::of(0i64..4_102_444_800_000)),
    )
        .prop_map(
            |((flag, tiny, short, int, long), (single, double, letter), (blob, millis))| Sample {
                flag,
                tiny,
                short,
                int,
                long,
                single,
                double,
                letter,
                blob,
                when: millis.map(|ms| Utc.timestamp_millis_opt(ms).unwrap()),
            },
        )
}

fn same_f64(a: f64, b: f64) -> bool { a == b || (a.is_nan() && b.is_nan()) }

proptest! {
    #![proptest_config(ProptestConfig { cases: 300, ..ProptestConfig::default() })]

    #[test]
    fn primitives_round_trip(sample in arb_sample()) {
        let registry = TypeRegistry::builder()
            .register(ObjectAdapter::arc(SampleSerializer))
            .build()
            .unwrap();
        let cell = shared(sample.clone());
        for format in &FORMATS {
            let bytes = encode_value(&registry, *format, &cell, 1).unwrap();
            let back = decode_value::<Sample>(&registry, *format, &bytes, 1).unwrap().unwrap();
            let back = back.borrow();
            prop_assert_eq!(back.flag, sample.flag);
            prop_assert_eq!(back.tiny, sample.tiny);
            prop_assert_eq!(back.short, sample.short);
            prop_assert_eq!(back.int, sample.int);
            prop_assert_eq!(back.long, sample.long);
            prop_assert!(same_f64(f64::from(back.single), f64::from(sample.single)));
            prop_assert!(same_f64(back.double, sample.double));
            prop_assert_eq!(back.letter, sample.letter);
            prop_assert_eq!(&back.blob, &sample.blob);
            prop_assert_eq!(back.when, sample.when);
        }
    }
}
