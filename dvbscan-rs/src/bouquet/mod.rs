//! Bouquet engine.
//!
//! Bouquets come from BAT sections and from `add`/`move` directives. A
//! member is a (original_network_id, transport_stream_id, service_id)
//! triple; it is resolved against the scanned services only when the list
//! is written, so members never seen in the broadcast drop out.

use std::collections::{HashMap, HashSet};
use std::io;

use dvbscan_model::Transponder;
use glob::Pattern;
use log::{debug, info, warn};

use crate::error::ConfigError;
use crate::output::{ServiceSelection, ServiceSink};
use crate::si::BatTable;

pub mod options;

pub use options::{BouquetOptions, Directive, Stage};

/// Group name of services that belong to no bouquet.
pub const UNSORTED: &str = "==UNSORTED==";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub original_network_id: u16,
    pub transport_stream_id: u16,
    pub service_id: u16,
}

/// Position of a service in the scanned transponder list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ServiceRef {
    transponder: usize,
    service: usize,
}

#[derive(Debug, Clone, Default)]
struct Bouquet {
    /// BAT bouquet_id, None for groups created by directives.
    id: Option<u16>,
    name: Option<String>,
    /// Multilingual name with the index of its language in `lang=`.
    ml_name: Option<(usize, String)>,
    services: HashMap<ServiceKey, Option<ServiceRef>>,
}

impl Bouquet {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    fn add_service(&mut self, key: ServiceKey, service_type: Option<u8>) {
        if self.services.contains_key(&key) {
            return;
        }
        self.services.insert(key, None);
        debug!(
            "== bouquet({}):{}<--tid={},sid={},nid={},type={}",
            self.id.map_or(-1, i32::from),
            self.name.as_deref().unwrap_or("NULL"),
            key.transport_stream_id,
            key.service_id,
            key.original_network_id,
            service_type.map_or(-1, i32::from)
        );
    }
}

/// Counts printed after the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BouquetSummary {
    pub bouquets: usize,
    pub mapped: usize,
    pub unmapped: usize,
    /// Distinct services written inside bouquets.
    pub channels: usize,
}

fn matches_any(patterns: &[Pattern], text: &str) -> bool {
    patterns.iter().any(|p| p.matches(text))
}

/// Index of the first pattern matching `text`.
fn first_match(patterns: &[Pattern], text: &str) -> Option<usize> {
    patterns.iter().position(|p| p.matches(text))
}

fn strip_space(s: &str) -> String {
    s.trim_matches(|c| c == ' ' || c == '\t').to_string()
}

#[derive(Debug, Default)]
pub struct BouquetEngine {
    options: BouquetOptions,
    /// Accepted multilingual bouquet name languages, first match wins.
    languages: Vec<Pattern>,
    /// In order of first appearance.
    bouquets: Vec<Bouquet>,
}

impl BouquetEngine {
    /// Create the engine and run the pre-scan directives.
    pub fn new(options: BouquetOptions) -> Self {
        let mut engine = BouquetEngine {
            options,
            ..Default::default()
        };
        for directive in engine.options.stage(Stage::PreScan) {
            if let Directive::Lang(languages) = directive {
                engine.languages = languages.clone();
            }
        }
        engine
    }

    pub fn parse(optstring: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(optstring.parse()?))
    }

    pub fn bouquet_count(&self) -> usize {
        self.bouquets.len()
    }

    /// Record the name and the members of a BAT section.
    pub fn apply_bat(&mut self, bat: &BatTable) {
        let index = match self.bouquets.iter().position(|b| b.id == Some(bat.bouquet_id)) {
            Some(index) => index,
            None => {
                self.bouquets.push(Bouquet {
                    id: Some(bat.bouquet_id),
                    ..Default::default()
                });
                self.bouquets.len() - 1
            }
        };
        let languages = &self.languages;
        let bouquet = &mut self.bouquets[index];

        let mut name_found = false;
        if let Some(name) = bat.bouquet_name() {
            name_found = true;
            if bouquet.name.is_none() {
                bouquet.name = Some(name.to_string());
            }
        }

        let mut ml_names = bat.multilingual_names().peekable();
        if ml_names.peek().is_some() {
            name_found = true;
        }
        for ml in ml_names {
            info!("  Multilingual bouquet name ({})", ml.language);
            let Some(rank) = first_match(languages, &ml.language) else {
                continue;
            };
            if bouquet.ml_name.as_ref().map_or(true, |(best, _)| rank < *best) {
                bouquet.ml_name = Some((rank, ml.name.clone()));
            }
        }

        for s in bat.tricolor_services() {
            bouquet.add_service(
                ServiceKey {
                    original_network_id: s.original_network_id,
                    transport_stream_id: s.transport_stream_id,
                    service_id: s.service_id,
                },
                None,
            );
        }

        if !name_found {
            warn!(
                "bouquet name descriptor not found, bouquet_id: {}",
                bat.bouquet_id
            );
        }

        for ts in &bat.transport_streams {
            for entry in &ts.services {
                bouquet.add_service(
                    ServiceKey {
                        original_network_id: ts.original_network_id,
                        transport_stream_id: ts.transport_stream_id,
                        service_id: entry.service_id,
                    },
                    Some(entry.service_type),
                );
            }
        }
    }

    fn merge(&mut self, target: &str, patterns: &[Pattern]) {
        let mut survivor: Option<usize> = None;
        let mut i = 0;
        while i < self.bouquets.len() {
            if !matches_any(patterns, self.bouquets[i].name()) {
                i += 1;
                continue;
            }
            match survivor {
                None => {
                    self.bouquets[i].name = Some(target.to_string());
                    survivor = Some(i);
                    i += 1;
                }
                Some(s) => {
                    let merged = self.bouquets.remove(i);
                    for (key, location) in merged.services {
                        self.bouquets[s].services.entry(key).or_insert(location);
                    }
                }
            }
        }
    }

    fn rename(&mut self, old: &str, new: &str) {
        if let Some(b) = self.bouquets.iter_mut().find(|b| b.name() == old) {
            b.name = Some(new.to_string());
        }
    }

    fn add(
        &mut self,
        scanned: &[Transponder],
        selection: &ServiceSelection,
        group: &str,
        patterns: &[Pattern],
        exclusive: bool,
    ) {
        let target = match self.bouquets.iter().position(|b| b.name() == group) {
            Some(index) => index,
            None => {
                self.bouquets.push(Bouquet {
                    name: Some(group.to_string()),
                    ..Default::default()
                });
                self.bouquets.len() - 1
            }
        };

        for (ti, t) in scanned.iter().enumerate() {
            for (si, s) in t.services.iter().enumerate() {
                if !selection.accepts_av(s) || !matches_any(patterns, s.name()) {
                    continue;
                }
                let key = ServiceKey {
                    original_network_id: t.original_network_id,
                    transport_stream_id: t.transport_stream_id,
                    service_id: s.service_id,
                };
                self.bouquets[target].services.insert(
                    key,
                    Some(ServiceRef {
                        transponder: ti,
                        service: si,
                    }),
                );
                if exclusive {
                    for (bi, other) in self.bouquets.iter_mut().enumerate() {
                        if bi != target {
                            other.services.remove(&key);
                        }
                    }
                }
            }
        }
    }

    fn substitute(
        scanned: &mut [Transponder],
        selection: &ServiceSelection,
        from: &str,
        to: &str,
    ) {
        if from.is_empty() {
            return;
        }
        for t in scanned.iter_mut() {
            for s in t.services.iter_mut() {
                if !selection.accepts_av(s) {
                    continue;
                }
                if let Some(name) = s.service_name.as_mut() {
                    if name.contains(from) {
                        *name = name.replace(from, to);
                    }
                }
            }
        }
    }

    fn remove(&mut self, patterns: &[Pattern]) {
        self.bouquets.retain(|b| !matches_any(patterns, b.name()));
    }

    fn run_stage(
        &mut self,
        stage: Stage,
        scanned: &mut [Transponder],
        selection: &ServiceSelection,
    ) {
        let directives: Vec<Directive> = self.options.stage(stage).cloned().collect();
        for directive in &directives {
            match directive {
                Directive::Lang(_) => {}
                Directive::Merge { target, patterns } => self.merge(target, patterns),
                Directive::Rename { old, new } => self.rename(old, new),
                Directive::Add {
                    group,
                    patterns,
                    exclusive,
                } => self.add(scanned, selection, group, patterns, *exclusive),
                Directive::Substitute { from, to } => {
                    Self::substitute(scanned, selection, from, to)
                }
                Directive::Ignore(patterns) | Directive::Remove(patterns) => {
                    self.remove(patterns)
                }
            }
        }
    }

    /// Run the post-scan and pre-output directives, then write every
    /// bouquet sorted by name followed by the unsorted services.
    pub fn dump(
        &mut self,
        scanned: &mut [Transponder],
        selection: &ServiceSelection,
        sink: &mut dyn ServiceSink,
    ) -> io::Result<BouquetSummary> {
        for b in &mut self.bouquets {
            if let Some((_, ml_name)) = b.ml_name.take() {
                b.name = Some(ml_name);
            }
            b.name = Some(strip_space(b.name()));
        }
        for t in scanned.iter_mut() {
            for s in &mut t.services {
                s.service_name = Some(strip_space(s.name()));
            }
        }

        self.run_stage(Stage::PostScan, scanned, selection);

        let mut summary = BouquetSummary::default();
        let mut unsorted: Vec<(ServiceKey, ServiceRef)> = Vec::new();
        for (ti, t) in scanned.iter().enumerate() {
            if t.wrong_frequency {
                continue;
            }
            for (si, s) in t.services.iter().enumerate() {
                if !selection.accepts_av(s) {
                    continue;
                }
                let key = ServiceKey {
                    original_network_id: t.original_network_id,
                    transport_stream_id: t.transport_stream_id,
                    service_id: s.service_id,
                };
                let location = ServiceRef {
                    transponder: ti,
                    service: si,
                };
                let mut mapped = false;
                for b in &mut self.bouquets {
                    if let Some(entry) = b.services.get_mut(&key) {
                        *entry = Some(location);
                        mapped = true;
                    }
                }
                if mapped {
                    summary.mapped += 1;
                } else {
                    unsorted.push((key, location));
                    summary.unmapped += 1;
                }
            }
        }

        self.run_stage(Stage::PreOutput, scanned, selection);

        let scanned: &[Transponder] = scanned;
        let name_of = |r: &ServiceRef| scanned[r.transponder].services[r.service].name();

        let mut order: Vec<usize> = (0..self.bouquets.len()).collect();
        order.sort_by(|&a, &b| self.bouquets[a].name().cmp(self.bouquets[b].name()));
        summary.bouquets = order.len();

        let mut channels: HashSet<ServiceKey> = HashSet::new();
        for index in order {
            let bouquet = &self.bouquets[index];
            let mut members: Vec<(ServiceKey, ServiceRef)> = bouquet
                .services
                .iter()
                .filter_map(|(key, location)| location.map(|l| (*key, l)))
                .collect();
            if members.is_empty() {
                continue;
            }
            channels.extend(members.iter().map(|(key, _)| *key));
            members.sort_by(|a, b| name_of(&a.1).cmp(name_of(&b.1)).then(a.0.cmp(&b.0)));

            sink.bouquet(bouquet.name())?;
            for (_, r) in &members {
                let t = &scanned[r.transponder];
                sink.service(t, &t.services[r.service])?;
            }
        }

        if !unsorted.is_empty() {
            unsorted.sort_by(|a, b| name_of(&a.1).cmp(name_of(&b.1)).then(a.0.cmp(&b.0)));
            sink.bouquet(UNSORTED)?;
            for (_, r) in &unsorted {
                let t = &scanned[r.transponder];
                sink.service(t, &t.services[r.service])?;
            }
        }
        summary.channels = channels.len();

        info!("==============================");
        info!("Bouquets:           {}", summary.bouquets);
        info!("Mapped services:    {}", summary.mapped);
        info!("Unmapped services:  {}", summary.unmapped);
        info!("Channels:           {}", summary.channels);
        info!("==============================");

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::RecordingSink;
    use crate::si::bat::BatTransportStream;
    use crate::si::descriptors::{
        DescriptorKind, MultilingualName, ServiceListEntry, TricolorService,
    };
    use dvbscan_model::{AudioStream, Service};

    fn tv(service_id: u16, name: &str) -> Service {
        let mut s = Service::new(service_id);
        s.service_name = Some(name.to_string());
        s.video_pid = 0x100 + service_id;
        s.audio.push(AudioStream {
            pid: 0x200 + service_id,
            language: String::new(),
        });
        s
    }

    fn transponder(tsid: u16, services: Vec<Service>) -> Transponder {
        let mut t = Transponder::new(11_000_000 + u32::from(tsid) * 20_000);
        t.original_network_id = 1;
        t.transport_stream_id = tsid;
        t.services = services;
        t
    }

    fn bat(bouquet_id: u16, name: &str, tsid: u16, service_ids: &[u16]) -> BatTable {
        BatTable {
            bouquet_id,
            version_number: 0,
            descriptors: vec![DescriptorKind::BouquetName(name.to_string())],
            transport_streams: vec![BatTransportStream {
                transport_stream_id: tsid,
                original_network_id: 1,
                services: service_ids
                    .iter()
                    .map(|&service_id| ServiceListEntry {
                        service_id,
                        service_type: 1,
                    })
                    .collect(),
            }],
        }
    }

    fn dump(
        engine: &mut BouquetEngine,
        scanned: &mut [Transponder],
    ) -> (Vec<String>, BouquetSummary) {
        let mut sink = RecordingSink::default();
        let summary = engine
            .dump(scanned, &ServiceSelection::default(), &mut sink)
            .unwrap();
        (sink.lines, summary)
    }

    #[test]
    fn test_add_then_substitute() {
        let mut scanned = vec![transponder(
            1,
            vec![tv(1, "Channel Ax"), tv(2, "Channel A"), tv(3, "Radio")],
        )];
        let mut engine = BouquetEngine::parse("s=A,B;add=Group1,Channel*").unwrap();

        let (lines, summary) = dump(&mut engine, &mut scanned);
        assert_eq!(
            lines,
            vec![":Group1", "Channel B", "Channel Bx", ":==UNSORTED==", "Radio"]
        );
        assert_eq!(summary.mapped, 2);
        assert_eq!(summary.unmapped, 1);
        assert_eq!(summary.channels, 2);
    }

    #[test]
    fn test_move_is_exclusive() {
        let mut scanned = vec![transponder(
            1,
            vec![tv(1, "Sport 1"), tv(2, "Sport 2"), tv(3, "News")],
        )];
        let mut engine = BouquetEngine::parse("move=Sport,Sport*").unwrap();
        engine.apply_bat(&bat(0x10, "Premium", 1, &[1, 2, 3]));
        engine.apply_bat(&bat(0x11, "Basic", 1, &[1]));

        let (lines, summary) = dump(&mut engine, &mut scanned);
        assert_eq!(
            lines,
            vec![":Premium", "News", ":Sport", "Sport 1", "Sport 2"]
        );
        assert_eq!(summary.bouquets, 3);
        assert_eq!(summary.channels, 3);
    }

    #[test]
    fn test_merge_without_duplicates() {
        let mut scanned = vec![transponder(
            1,
            vec![tv(1, "One"), tv(2, "Two"), tv(3, "Three")],
        )];
        let mut engine = BouquetEngine::parse("merge=Sky,Sky *").unwrap();
        engine.apply_bat(&bat(0x20, "Sky UK", 1, &[1, 2]));
        engine.apply_bat(&bat(0x21, "Sky Sports", 1, &[2, 3]));
        engine.apply_bat(&bat(0x22, "Sky Movies", 1, &[3]));

        let (lines, summary) = dump(&mut engine, &mut scanned);
        assert_eq!(lines, vec![":Sky", "One", "Three", "Two"]);
        assert_eq!(summary.bouquets, 1);
        assert_eq!(summary.mapped, 3);
        assert_eq!(summary.channels, 3);
    }

    #[test]
    fn test_ignore_and_remove_stages() {
        let mut scanned = vec![transponder(1, vec![tv(1, "Shop"), tv(2, "Film")])];
        let mut engine = BouquetEngine::parse("ignore=Shopping").unwrap();
        engine.apply_bat(&bat(0x30, "Shopping", 1, &[1]));
        engine.apply_bat(&bat(0x31, "Movies", 1, &[2]));
        let (lines, _) = dump(&mut engine, &mut scanned);
        // ignored before mapping: the service falls through to unsorted
        assert_eq!(lines, vec![":Movies", "Film", ":==UNSORTED==", "Shop"]);

        let mut scanned = vec![transponder(1, vec![tv(1, "Shop"), tv(2, "Film")])];
        let mut engine = BouquetEngine::parse("remove=Shopping").unwrap();
        engine.apply_bat(&bat(0x30, "Shopping", 1, &[1]));
        engine.apply_bat(&bat(0x31, "Movies", 1, &[2]));
        let (lines, summary) = dump(&mut engine, &mut scanned);
        assert_eq!(lines, vec![":Movies", "Film"]);
        assert_eq!(summary.mapped, 2);
    }

    #[test]
    fn test_unresolved_members_are_dropped() {
        let mut scanned = vec![transponder(1, vec![tv(1, "Here")])];
        let mut engine = BouquetEngine::default();
        engine.apply_bat(&bat(0x40, "Mixed", 1, &[1, 99]));
        engine.apply_bat(&bat(0x41, "Elsewhere", 7, &[1]));

        let (lines, summary) = dump(&mut engine, &mut scanned);
        assert_eq!(lines, vec![":Mixed", "Here"]);
        assert_eq!(summary.bouquets, 2);
    }

    #[test]
    fn test_multilingual_name_and_tricolor_list() {
        let mut engine = BouquetEngine::parse("lang=rus").unwrap();
        let mut table = bat(0x50, "  Tricolor ", 1, &[]);
        table.descriptors.push(DescriptorKind::MultilingualBouquetName(vec![
            MultilingualName {
                language: "eng".to_string(),
                name: "Tricolor TV".to_string(),
            },
            MultilingualName {
                language: "rus".to_string(),
                name: " Триколор ".to_string(),
            },
        ]));
        table.descriptors.push(DescriptorKind::TricolorServiceList(vec![TricolorService {
            transport_stream_id: 1,
            original_network_id: 1,
            service_id: 2,
        }]));
        engine.apply_bat(&table);

        let mut scanned = vec![transponder(1, vec![tv(2, "Первый")])];
        let (lines, _) = dump(&mut engine, &mut scanned);
        assert_eq!(lines, vec![":Триколор", "Первый"]);
    }

    #[test]
    fn test_multilingual_name_follows_lang_order() {
        let mut engine = BouquetEngine::parse("lang=rus,eng").unwrap();
        let mut table = bat(0x51, "Tricolor", 1, &[2]);
        table.descriptors.push(DescriptorKind::MultilingualBouquetName(vec![
            MultilingualName {
                language: "eng".to_string(),
                name: "English".to_string(),
            },
            MultilingualName {
                language: "rus".to_string(),
                name: "Russian".to_string(),
            },
        ]));
        engine.apply_bat(&table);
        assert_eq!(engine.bouquets[0].ml_name, Some((0, "Russian".to_string())));

        // a later section with a less preferred language keeps the name
        let mut later = bat(0x51, "Tricolor", 1, &[]);
        later.descriptors.push(DescriptorKind::MultilingualBouquetName(vec![
            MultilingualName {
                language: "eng".to_string(),
                name: "English 2".to_string(),
            },
        ]));
        engine.apply_bat(&later);

        let mut scanned = vec![transponder(1, vec![tv(2, "Pervyi")])];
        let (lines, _) = dump(&mut engine, &mut scanned);
        assert_eq!(lines, vec![":Russian", "Pervyi"]);
    }

    #[test]
    fn test_bat_sections_accumulate() {
        let mut engine = BouquetEngine::default();
        engine.apply_bat(&bat(0x60, "First name", 1, &[1]));
        engine.apply_bat(&bat(0x60, "Second name", 2, &[1]));
        assert_eq!(engine.bouquet_count(), 1);
        assert_eq!(engine.bouquets[0].name(), "First name");
        assert_eq!(engine.bouquets[0].services.len(), 2);
    }
}
