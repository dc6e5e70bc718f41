//! Random events that may strike the town between weeks.

use gateway_town_core::{Coordinate, Economy, TownEvent};
use gateway_town_world::{
    BusinessTemplate, DecorTemplate, Map, MapObject, MessageBoard, ObjectTemplate,
};
use glam::Vec2;
use rand::Rng;

/// Last day of the year (zero-based) on which no event can fire.
const QUIET_UNTIL_DAY: u32 = 19;

/// Jackpots are paid out in whole multiples of this amount.
pub const JACKPOT_UNIT: i64 = 100_000;

/// Cells flattened by a meteor, relative to the impact cell.
const METEOR_FOOTPRINT: [(i32, i32); 13] = [
    (0, 0),
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
    (2, 0),
    (-2, 0),
    (0, 2),
    (0, -2),
];

/// Events rolled before a build day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RandomEvent {
    /// Road upkeep of every existing road drops to zero.
    TaxBreak,
    /// A meteor flattens a small area; everything destroyed is refunded twice.
    Meteor,
    /// Road and business upkeep grow by half.
    TaxHike,
    /// A visitor wins big at a casino and the town pays.
    CasinoJackpot,
    /// Existing billboards earn five times as much.
    AdvertiserFrenzy,
    /// Every unlocked object lands on a random cell.
    Tornado,
}

impl RandomEvent {
    /// Every event, in roll order.
    pub const ALL: [Self; 6] = [
        Self::TaxBreak,
        Self::Meteor,
        Self::TaxHike,
        Self::CasinoJackpot,
        Self::AdvertiserFrenzy,
        Self::Tornado,
    ];

    /// Title of the message announcing the event.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::TaxBreak => "Generous Government!",
            Self::Meteor => "Meteor Strike!",
            Self::TaxHike => "Grubby Government!",
            Self::CasinoJackpot => "Gamblers' Dream!",
            Self::AdvertiserFrenzy => "Advertiser Frenzy!",
            Self::Tornado => "Tornado Touchdown!",
        }
    }
}

pub(crate) struct EventScope<'a> {
    pub(crate) map: &'a mut Map,
    pub(crate) economy: &'a mut dyn Economy,
    pub(crate) messages: &'a mut MessageBoard,
    pub(crate) events: &'a mut Vec<TownEvent>,
    pub(crate) town_name: &'a str,
}

/// Rolls a coin and, on success, one of the events. Returns the event that
/// took effect.
pub(crate) fn roll<R: Rng + ?Sized>(
    rng: &mut R,
    day: u32,
    scope: &mut EventScope<'_>,
) -> Option<RandomEvent> {
    if day <= QUIET_UNTIL_DAY {
        return None;
    }
    if rng.gen_range(0..2) != 0 {
        return None;
    }
    let event = RandomEvent::ALL[rng.gen_range(0..RandomEvent::ALL.len())];
    apply(event, rng, scope).then_some(event)
}

/// Applies `event`. Returns false when the town was spared.
pub(crate) fn apply<R: Rng + ?Sized>(
    event: RandomEvent,
    rng: &mut R,
    scope: &mut EventScope<'_>,
) -> bool {
    let fired = match event {
        RandomEvent::TaxBreak => {
            tax_break(scope);
            true
        }
        RandomEvent::Meteor => {
            meteor(rng, scope);
            true
        }
        RandomEvent::TaxHike => {
            tax_hike(scope);
            true
        }
        RandomEvent::CasinoJackpot => casino_jackpot(scope),
        RandomEvent::AdvertiserFrenzy => {
            advertiser_frenzy(scope);
            true
        }
        RandomEvent::Tornado => {
            scope.map.shuffle(rng);
            scope.messages.show(
                event.title(),
                "A tornado tore through town!\n\nEvery road and building that wasn't bolted down \
                 has been moved. Sorry!",
            );
            true
        }
    };
    if fired {
        tracing::info!(?event, money = scope.economy.money(), "random event");
    }
    fired
}

fn tax_break(scope: &mut EventScope<'_>) {
    for object in scope.map.iter_mut() {
        if let ObjectTemplate::Road(road) = object.template_mut() {
            road.set_upkeep(0);
        }
    }
    scope.messages.show(
        RandomEvent::TaxBreak.title(),
        "The governor has paid off every road you own.\n\nExisting roads no longer cost any upkeep.",
    );
}

fn raised(upkeep: i64) -> i64 {
    (upkeep as f64 * 1.5) as i64
}

fn tax_hike(scope: &mut EventScope<'_>) {
    for object in scope.map.iter_mut() {
        match object.template_mut() {
            ObjectTemplate::Road(road) => {
                let upkeep = raised(road.upkeep());
                road.set_upkeep(upkeep);
            }
            ObjectTemplate::Business(business) => {
                business.terms.weekly_upkeep = raised(business.terms.weekly_upkeep);
            }
            ObjectTemplate::Decor(_) => {}
        }
    }
    scope.messages.show(
        RandomEvent::TaxHike.title(),
        "The governor says you aren't paying your fair share.\n\nUpkeep for every road and \
         business is up 50%.",
    );
}

fn casino_jackpot(scope: &mut EventScope<'_>) -> bool {
    let has_casino = scope.map.iter().any(|object| {
        object
            .as_business()
            .and_then(BusinessTemplate::stop)
            .is_some_and(|stop| stop.casino)
    });
    let money = scope.economy.money();
    if !has_casino || money < JACKPOT_UNIT {
        return false;
    }

    let payout = JACKPOT_UNIT * (money / JACKPOT_UNIT);
    scope.economy.spend_money(payout);
    scope.messages.show(
        RandomEvent::CasinoJackpot.title(),
        format!(
            "Huge win for a passing traveler at the casino in {}!\n\nThey walked away with {} \
             dollars. The mayor is not taking it well.",
            scope.town_name, payout
        ),
    );
    true
}

fn advertiser_frenzy(scope: &mut EventScope<'_>) {
    for object in scope.map.iter_mut() {
        if let ObjectTemplate::Business(business) = object.template_mut() {
            if business.billboard().is_some() {
                business.terms.revenue_per_customer *= 5;
            }
        }
    }
    scope.messages.show(
        RandomEvent::AdvertiserFrenzy.title(),
        "Your little town is a hotspot now.\n\nExisting billboards pay 5 times as much.",
    );
}

fn meteor<R: Rng + ?Sized>(rng: &mut R, scope: &mut EventScope<'_>) {
    let bounds = *scope.map.bounds();
    let impact = Vec2::new(
        rng.gen_range(bounds.min().x..=bounds.max().x),
        rng.gen_range(bounds.min().y..=bounds.max().y),
    );
    let center = scope.map.grid().coordinate_of(impact);

    let mut refunded = 0;
    for (dx, dy) in METEOR_FOOTPRINT {
        let cell = Coordinate::new(center.x() + dx, center.y() + dy);
        refunded += destroy(cell, scope);
    }
    tracing::info!(%center, refunded, "meteor impact");

    scope.messages.show(
        RandomEvent::Meteor.title(),
        "A meteor crashed into town!\n\nLuckily you are insured against natural disasters. \
         Everything destroyed was refunded twice over.",
    );
}

/// Flattens one cell and drops a crater on it. Locked objects survive.
fn destroy(cell: Coordinate, scope: &mut EventScope<'_>) -> i64 {
    if !scope.map.in_bounds(cell) {
        return 0;
    }
    if scope.map.get_at(cell).is_some_and(MapObject::is_locked) {
        return 0;
    }

    let mut refunded = 0;
    if let Some(object) = scope.map.erase_at(cell, false, scope.events) {
        if let Some(refund) = object.refund() {
            refunded = 2 * refund;
            scope.economy.add_money(refunded);
        }
    }
    scope.map.put_at(
        MapObject::new(ObjectTemplate::Decor(DecorTemplate::meteor_crater())),
        cell,
        false,
        scope.events,
    );
    refunded
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_town_core::{GridService, WorldBounds};
    use gateway_town_world::{BusinessCatalog, RoadTile, RoadVariant, TownLedger};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Town {
        map: Map,
        ledger: TownLedger,
        messages: MessageBoard,
        events: Vec<TownEvent>,
    }

    impl Town {
        fn new(half_extent: f32) -> Self {
            let bounds = WorldBounds::new(Vec2::splat(-half_extent), Vec2::splat(half_extent));
            Self {
                map: Map::new(GridService::new(1.0), bounds),
                ledger: TownLedger::new(1_000, 0),
                messages: MessageBoard::default(),
                events: Vec::new(),
            }
        }

        fn put(&mut self, object: MapObject, cell: Coordinate) {
            self.map.put_at(object, cell, true, &mut self.events);
        }

        fn apply(&mut self, event: RandomEvent, seed: u64) -> bool {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut scope = EventScope {
                map: &mut self.map,
                economy: &mut self.ledger,
                messages: &mut self.messages,
                events: &mut self.events,
                town_name: "Dustwater",
            };
            apply(event, &mut rng, &mut scope)
        }
    }

    fn business(title: &str) -> MapObject {
        let template = BusinessCatalog::standard()
            .find(title)
            .cloned()
            .expect("catalog entry");
        MapObject::new(ObjectTemplate::Business(template))
    }

    #[test]
    fn early_days_are_quiet() {
        let mut town = Town::new(3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..50 {
            let mut scope = EventScope {
                map: &mut town.map,
                economy: &mut town.ledger,
                messages: &mut town.messages,
                events: &mut town.events,
                town_name: "Dustwater",
            };
            assert_eq!(roll(&mut rng, QUIET_UNTIL_DAY, &mut scope), None);
        }
        assert!(!town.messages.is_open());
    }

    #[test]
    fn upkeep_events_rewrite_templates() {
        let mut town = Town::new(3.0);
        town.put(MapObject::road(RoadVariant::ISOLATED), Coordinate::new(0, 0));
        town.put(business("Diner"), Coordinate::new(2, 2));

        assert!(town.apply(RandomEvent::TaxHike, 1));
        assert_eq!(
            town.map.get_at(Coordinate::new(0, 0)).and_then(MapObject::upkeep),
            Some(3)
        );
        assert_eq!(
            town.map.get_at(Coordinate::new(2, 2)).and_then(MapObject::upkeep),
            Some(135)
        );

        assert!(town.apply(RandomEvent::TaxBreak, 1));
        assert_eq!(
            town.map.get_at(Coordinate::new(0, 0)).and_then(MapObject::upkeep),
            Some(0),
            "roads are paid off"
        );
        assert_eq!(
            town.map.get_at(Coordinate::new(2, 2)).and_then(MapObject::upkeep),
            Some(135),
            "businesses keep paying"
        );
        assert_eq!(
            town.messages.current().map(|message| message.title.as_str()),
            Some(RandomEvent::TaxBreak.title())
        );
    }

    #[test]
    fn advertiser_frenzy_only_touches_billboards() {
        let mut town = Town::new(3.0);
        town.put(business("Billboard"), Coordinate::new(0, 0));
        town.put(business("Diner"), Coordinate::new(2, 2));

        assert!(town.apply(RandomEvent::AdvertiserFrenzy, 1));

        let revenue = |cell| {
            town.map
                .get_at(cell)
                .and_then(MapObject::as_business)
                .map(|business| business.terms.revenue_per_customer)
        };
        assert_eq!(revenue(Coordinate::new(0, 0)), Some(20));
        assert_eq!(revenue(Coordinate::new(2, 2)), Some(75));
    }

    #[test]
    fn jackpot_needs_a_casino_and_deep_pockets() {
        let mut town = Town::new(3.0);
        town.ledger = TownLedger::new(350_000, 0);
        assert!(!town.apply(RandomEvent::CasinoJackpot, 1), "no casino");
        assert_eq!(town.ledger.money(), 350_000);

        town.put(business("Casino"), Coordinate::new(0, 0));
        assert!(town.apply(RandomEvent::CasinoJackpot, 1));
        assert_eq!(town.ledger.money(), 50_000);
        let message = town.messages.current().expect("jackpot announced");
        assert!(message.body.contains("Dustwater"));
        assert!(message.body.contains("300000"));

        assert!(
            !town.apply(RandomEvent::CasinoJackpot, 1),
            "less than one jackpot left"
        );
    }

    #[test]
    fn meteor_on_a_single_cell_world() {
        let mut town = Town::new(0.4);
        town.put(business("Diner"), Coordinate::new(0, 0));

        assert!(town.apply(RandomEvent::Meteor, 8));

        assert_eq!(town.ledger.money(), 1_000 + 2 * 1_250, "double refund");
        let crater = town.map.get_at(Coordinate::new(0, 0)).expect("crater");
        assert!(crater.is_decor());
        assert_eq!(town.map.len(), 1, "cells outside the bounds stay empty");
        assert_eq!(
            town.events,
            vec![
                TownEvent::ObjectErased {
                    coordinate: Coordinate::new(0, 0)
                },
                TownEvent::ObjectPlaced {
                    coordinate: Coordinate::new(0, 0)
                },
            ]
        );
    }

    #[test]
    fn meteor_spares_locked_objects() {
        let mut town = Town::new(0.4);
        let starter = MapObject::locked(ObjectTemplate::Road(RoadTile::starter(
            RoadVariant::ISOLATED,
        )));
        town.put(starter, Coordinate::new(0, 0));

        assert!(town.apply(RandomEvent::Meteor, 8));

        assert!(town
            .map
            .get_at(Coordinate::new(0, 0))
            .is_some_and(|object| object.as_road().is_some()));
        assert_eq!(town.ledger.money(), 1_000);
    }
}
