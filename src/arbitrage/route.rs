use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use smallvec::SmallVec;

use crate::engine::types::{MarketId, Side};
use crate::engine::universe::Universe;

/// Whether legs are filled passively (resting orders) or aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Initiation {
    Maker,
    Taker,
}

impl Initiation {
    pub const ALL: [Initiation; 2] = [Initiation::Maker, Initiation::Taker];

    fn marker(self) -> char {
        match self {
            Initiation::Maker => 'M',
            Initiation::Taker => 'T',
        }
    }

    /// Aggressor side of the tickers that fill a leg trading in `direction`.
    /// A taker crosses the spread itself; a maker is filled by the other side.
    pub fn ticker_side(self, direction: Side) -> Side {
        match self {
            Initiation::Taker => direction,
            Initiation::Maker => direction.opposite(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteKind {
    /// Same hub currency on both venues.
    Direct,
    /// The origin venue converts the destination's hub into the origin's.
    OriginConversion,
    /// The destination venue converts its hub back into the origin's.
    DestinationConversion,
}

impl RouteKind {
    fn tag(self) -> &'static str {
        match self {
            RouteKind::Direct => "direct",
            RouteKind::OriginConversion => "origin",
            RouteKind::DestinationConversion => "destination",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArbitrageType {
    pub initiation: Initiation,
    pub kind: RouteKind,
}

impl ArbitrageType {
    pub const fn new(initiation: Initiation, kind: RouteKind) -> Self {
        Self { initiation, kind }
    }

    pub fn as_str(self) -> &'static str {
        use Initiation::*;
        use RouteKind::*;
        match (self.initiation, self.kind) {
            (Maker, Direct) => "MakerDirect",
            (Taker, Direct) => "TakerDirect",
            (Maker, OriginConversion) => "MakerOriginConversion",
            (Taker, OriginConversion) => "TakerOriginConversion",
            (Maker, DestinationConversion) => "MakerDestinationConversion",
            (Taker, DestinationConversion) => "TakerDestinationConversion",
        }
    }
}

impl fmt::Display for ArbitrageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ArbitrageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegRole {
    Buy,
    Sell,
    Convert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegSpec {
    pub role: LegRole,
    pub market: MarketId,
    /// What the route does on this market.
    pub direction: Side,
    /// Which ticker stream fills it.
    pub ticker_side: Side,
}

/// Ordered legs of one arbitrage route plus its canonical id.
///
/// The asset is bought on `origin` and sold on `destination`. Conversion
/// routes add a third leg bridging the two hub currencies.
#[derive(Debug, Clone)]
pub struct Route {
    id: String,
    arb_type: ArbitrageType,
    origin: MarketId,
    destination: MarketId,
    conversion: Option<MarketId>,
    legs: SmallVec<[LegSpec; 3]>,
}

impl Route {
    pub fn new(
        universe: &Universe,
        arb_type: ArbitrageType,
        origin: MarketId,
        destination: MarketId,
        conversion: Option<MarketId>,
    ) -> Self {
        let leg = |role, market, direction: Side| LegSpec {
            role,
            market,
            direction,
            ticker_side: arb_type.initiation.ticker_side(direction),
        };
        let mut legs = SmallVec::new();
        legs.push(leg(LegRole::Buy, origin, Side::Buy));
        legs.push(leg(LegRole::Sell, destination, Side::Sell));
        match (arb_type.kind, conversion) {
            // buy the origin hub currency, paying in the destination's
            (RouteKind::OriginConversion, Some(market)) => legs.push(leg(LegRole::Convert, market, Side::Buy)),
            // sell the destination hub currency for the origin's
            (RouteKind::DestinationConversion, Some(market)) => legs.push(leg(LegRole::Convert, market, Side::Sell)),
            _ => {}
        }
        Self {
            id: Self::canonical_id(universe, arb_type, origin, destination, conversion),
            arb_type,
            origin,
            destination,
            conversion,
            legs,
        }
    }

    /// `{M|T}:{kind}:{origin}>{destination}[~{conversion}]`, markets written
    /// as `exchange.hub.market`.
    pub fn canonical_id(
        universe: &Universe,
        arb_type: ArbitrageType,
        origin: MarketId,
        destination: MarketId,
        conversion: Option<MarketId>,
    ) -> String {
        let mut id = format!(
            "{}:{}:{}>{}",
            arb_type.initiation.marker(),
            arb_type.kind.tag(),
            universe.market(origin).key(),
            universe.market(destination).key(),
        );
        if let Some(conversion) = conversion {
            id.push('~');
            id.push_str(&universe.market(conversion).key().to_string());
        }
        id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arb_type(&self) -> ArbitrageType {
        self.arb_type
    }

    pub fn origin(&self) -> MarketId {
        self.origin
    }

    pub fn destination(&self) -> MarketId {
        self.destination
    }

    pub fn conversion(&self) -> Option<MarketId> {
        self.conversion
    }

    pub fn legs(&self) -> &[LegSpec] {
        &self.legs
    }

    pub fn leg(&self, role: LegRole) -> Option<&LegSpec> {
        self.legs.iter().find(|l| l.role == role)
    }

    /// Leg whose hub amount is what the cycle spends.
    pub fn entry_role(&self) -> LegRole {
        match self.arb_type.kind {
            RouteKind::OriginConversion => LegRole::Convert,
            _ => LegRole::Buy,
        }
    }

    /// Leg whose hub amount is what the cycle receives.
    pub fn exit_role(&self) -> LegRole {
        match self.arb_type.kind {
            RouteKind::DestinationConversion => LegRole::Convert,
            _ => LegRole::Sell,
        }
    }

    /// The leg whose hub amount the conversion leg has to match.
    pub fn convert_source(&self) -> Option<LegRole> {
        match self.arb_type.kind {
            RouteKind::Direct => None,
            RouteKind::OriginConversion => Some(LegRole::Buy),
            RouteKind::DestinationConversion => Some(LegRole::Sell),
        }
    }
}

/// Route kinds the pair supports, with the conversion market where needed.
pub fn supported_kinds(
    universe: &Universe,
    origin: MarketId,
    destination: MarketId,
) -> SmallVec<[(RouteKind, Option<MarketId>); 2]> {
    let mut kinds = SmallVec::new();
    if universe.is_simple_arb(origin, destination) {
        kinds.push((RouteKind::Direct, None));
        return kinds;
    }
    let (o, d) = (universe.market(origin), universe.market(destination));
    if o.exchange() == d.exchange() {
        return kinds;
    }
    if let Some(market) = universe.get_conversion(o.exchange(), d.hub_symbol(), o.hub_symbol()) {
        kinds.push((RouteKind::OriginConversion, Some(market)));
    }
    if let Some(market) = universe.get_conversion(d.exchange(), o.hub_symbol(), d.hub_symbol()) {
        kinds.push((RouteKind::DestinationConversion, Some(market)));
    }
    kinds
}

/// Every route between ordered pairs of markets trading the same asset on
/// different venues, for both initiations.
pub fn candidate_routes(universe: &Universe) -> Vec<Route> {
    let mut routes = Vec::new();
    for asset in universe.assets() {
        let markets = asset.markets();
        for &origin in markets {
            for &destination in markets {
                if origin == destination {
                    continue;
                }
                for (kind, conversion) in supported_kinds(universe, origin, destination) {
                    for initiation in Initiation::ALL {
                        let arb_type = ArbitrageType::new(initiation, kind);
                        routes.push(Route::new(universe, arb_type, origin, destination, conversion));
                    }
                }
            }
        }
    }
    routes
}
