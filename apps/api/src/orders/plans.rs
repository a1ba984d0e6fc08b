use serde::Serialize;

use crate::models::order::PackageType;

/// A purchasable credit bundle. Checkout happens on the external payment page.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub package_type: PackageType,
    pub name: &'static str,
    pub credits: i32,
    /// Minor currency units (kobo).
    pub price: i64,
    pub currency: &'static str,
    pub popular: bool,
    pub checkout_url: &'static str,
    pub features: &'static [&'static str],
}

const PLANS: [Plan; 3] = [
    Plan {
        package_type: PackageType::StarterPack,
        name: "Starter Pack",
        credits: 1,
        price: 400_000,
        currency: "NGN",
        popular: false,
        checkout_url: "https://paystack.shop/pay/hmwg3gvs1w",
        features: &[
            "ATS-optimized resume",
            "Professional cover letter",
            "Interview Q&A guide",
            "PDF & DOCX formats",
            "Email delivery",
        ],
    },
    Plan {
        package_type: PackageType::CareerBoost,
        name: "Career Boost",
        credits: 5,
        price: 1_250_000,
        currency: "NGN",
        popular: true,
        checkout_url: "https://paystack.shop/pay/16c66t0hk0",
        features: &[
            "Everything in Starter Pack",
            "5 complete resume packages",
            "LinkedIn optimization tips",
            "Industry-specific templates",
            "Priority support",
            "Multiple job applications",
        ],
    },
    Plan {
        package_type: PackageType::ProfessionalSuite,
        name: "Professional Suite",
        credits: 15,
        price: 2_500_000,
        currency: "NGN",
        popular: false,
        checkout_url: "https://paystack.shop/pay/04alipcgbq",
        features: &[
            "Everything in Career Boost",
            "15 complete resume packages",
            "Personal branding guide",
            "Advanced ATS analysis",
            "Executive resume templates",
            "3 months email support",
            "Career strategy consultation",
        ],
    },
];

pub fn catalogue() -> &'static [Plan] {
    &PLANS
}

pub fn plan_for(package_type: PackageType) -> &'static Plan {
    match package_type {
        PackageType::StarterPack => &PLANS[0],
        PackageType::CareerBoost => &PLANS[1],
        PackageType::ProfessionalSuite => &PLANS[2],
    }
}
