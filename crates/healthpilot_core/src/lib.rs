pub mod domain;
pub mod ports;
pub mod rules;

pub use domain::{
    Achievement, AchievementKind, ActivityLevel, Challenge, ChallengeEnrollment,
    ChallengeKind, ChallengeStatus, CompleteProfile, DailyTarget, GamificationState, GoalKind,
    LedgerEntry, NutritionFacts, PartnerOffer, Redemption, Sex, UserCredentials, UserProfile,
};
pub use ports::{
    ChallengeParticipant, LeaderboardRow, NewUser, NutritionEstimator, NutritionStore, PortError,
    PortResult, ProfileUpdate,
};
