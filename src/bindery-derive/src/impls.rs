use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::token::Comma;
use syn::visit_mut::{self, VisitMut};
use syn::{
    AngleBracketedGenericArguments, Attribute, Error as SynError, Expr, FnArg, GenericArgument,
    Ident, ImplItem, ImplItemFn, ItemImpl, LitStr, Meta, Pat, PatType, PathArguments,
    Result as SynResult, ReturnType, Signature, Type, TypePath,
};

use crate::attrs::AttributeData;

const SCOPE_ATTRIBUTES: [(&str, &str); 7] = [
    ("service", "Service"),
    ("structure", "Structure"),
    ("this", "This"),
    ("uses", "Uses"),
    ("invocation", "Invocation"),
    ("state", "State"),
    ("concern_for", "ConcernFor"),
];

const QUALIFIER_ATTRIBUTES: [&str; 6] = [
    "optional",
    "tagged",
    "identified_by",
    "active",
    "available",
    "qualified",
];

const HANDLE_TYPES: [&str; 3] = ["This", "ServiceRef", "Property"];

#[derive(Debug)]
struct ConstructorData {
    identifier: Ident,
    arguments: Vec<ArgumentData>,
    return_type: ReturnTypeData,
}

#[derive(Debug)]
struct SetterData {
    identifier: Ident,
    argument: ArgumentData,
}

#[derive(Debug)]
struct ArgumentData {
    span: Span,
    name: String,
    scope: Ident,
    shape: ShapeData,
    element: Type,
    handle: bool,
    optional: bool,
    qualifiers: Vec<TokenStream2>,
    property: Option<LitStr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeData {
    Single,
    Optional,
    Iterable,
}

#[derive(Debug)]
enum ReturnTypeData {
    Infallible,
    Result { error_type: Type },
}

struct AttributeRemovalVisitor;

impl AttributeRemovalVisitor {
    fn is_custom_attribute(attr: &Attribute) -> bool {
        let path = attr.path();
        path.is_ident("inject")
            || SCOPE_ATTRIBUTES.iter().any(|(name, _)| path.is_ident(name))
            || QUALIFIER_ATTRIBUTES.iter().any(|name| path.is_ident(name))
    }
}

impl VisitMut for AttributeRemovalVisitor {
    fn visit_attributes_mut(&mut self, attrs: &mut Vec<Attribute>) {
        attrs.retain(|attr| !Self::is_custom_attribute(attr));
        attrs
            .iter_mut()
            .for_each(|attr| visit_mut::visit_attribute_mut(self, attr));
    }
}

pub fn expand_implementation(
    impls: TokenStream,
    attr_data: AttributeData,
) -> SynResult<TokenStream2> {
    let mut impls = match syn::parse::<ItemImpl>(impls) {
        Ok(impls) => impls,
        Err(err) => {
            return Err(SynError::new(
                err.span(),
                "`#[fragment]` should be annotated on the `impl` block",
            ))
        }
    };
    if let Some((_, path, _)) = &impls.trait_ {
        return Err(SynError::new(
            path.span(),
            "`#[fragment]` should be annotated on an inherent `impl` block",
        ));
    }

    let self_type = get_self_type(&impls)?;
    let (constructor, setters) = get_injected_signatures(&impls.items, impls.span())?;
    let ctor_data = parse_constructor(&self_type, constructor)?;
    let setters = setters
        .into_iter()
        .map(parse_setter)
        .collect::<SynResult<Vec<_>>>()?;

    let expanded = expand_fragment_implementation(&impls, ctor_data, setters, attr_data)?;

    let mut visitor = AttributeRemovalVisitor;
    visitor.visit_item_impl_mut(&mut impls);

    Ok(quote! {
        #impls
        #expanded
    })
}

fn get_self_type(impls: &ItemImpl) -> SynResult<TypePath> {
    if let Type::Path(ty) = impls.self_ty.as_ref() {
        Ok(ty.clone())
    } else {
        Err(SynError::new(impls.self_ty.span(), "invalid self type"))
    }
}

fn get_injected_signatures(
    items: &[ImplItem],
    impl_span: Span,
) -> SynResult<(Signature, Vec<Signature>)> {
    let (setters, ctors): (Vec<_>, Vec<_>) = items
        .iter()
        .filter_map(filter_and_map_item_fn)
        .filter(is_annotated_with_inject)
        .map(|item_fn| item_fn.sig.clone())
        .partition(|signature| signature.receiver().is_some());

    let mut ctors = ctors.into_iter();
    let Some(ctor) = ctors.next() else {
        return Err(SynError::new(
            impl_span,
            "no associated function is annotated with `#[inject]`",
        ));
    };
    if let Some(other) = ctors.next() {
        return Err(SynError::new(
            other.span(),
            "only one associated function can be annotated with `#[inject]`",
        ));
    }

    Ok((ctor, setters))
}

fn filter_and_map_item_fn(item: &ImplItem) -> Option<&ImplItemFn> {
    if let ImplItem::Fn(impl_fn) = item {
        Some(impl_fn)
    } else {
        None
    }
}

fn is_annotated_with_inject(item_fn: &&ImplItemFn) -> bool {
    item_fn
        .attrs
        .iter()
        .any(|attr| matches!(&attr.meta, Meta::Path(path) if path.is_ident("inject")))
}

fn parse_constructor(self_type: &TypePath, signature: Signature) -> SynResult<ConstructorData> {
    let identifier = signature.ident;
    let arguments = parse_arguments(signature.inputs)?;
    let return_type = parse_constructor_return_type(signature.output, self_type)?;

    Ok(ConstructorData {
        identifier,
        arguments,
        return_type,
    })
}

fn parse_setter(signature: Signature) -> SynResult<SetterData> {
    let span = signature.span();
    match signature.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_some() => {}
        Some(receiver) => {
            return Err(SynError::new(
                receiver.span(),
                "an injected setter should take `&mut self`",
            ))
        }
        None => unreachable!("a setter should have a receiver argument"),
    }
    if !matches!(signature.output, ReturnType::Default) {
        return Err(SynError::new(
            signature.output.span(),
            "an injected setter should not return anything",
        ));
    }

    let identifier = signature.ident;
    let mut arguments = parse_arguments(signature.inputs)?;
    if arguments.len() != 1 {
        return Err(SynError::new(
            span,
            "an injected setter should take exactly one parameter besides `&mut self`",
        ));
    }
    let argument = arguments.remove(0);

    Ok(SetterData {
        identifier,
        argument,
    })
}

fn parse_arguments(inputs: Punctuated<FnArg, Comma>) -> SynResult<Vec<ArgumentData>> {
    inputs
        .into_iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(arg) => Some(arg),
            FnArg::Receiver(_) => None,
        })
        .enumerate()
        .map(|(index, arg)| parse_argument(index, arg))
        .collect()
}

fn parse_argument(index: usize, arg: PatType) -> SynResult<ArgumentData> {
    let span = arg.span();
    let name = match arg.pat.as_ref() {
        Pat::Ident(pat) => pat.ident.to_string(),
        _ => format!("arg{index}"),
    };

    let mut scope = None;
    let mut property = None;
    let mut optional = false;
    let mut qualifiers = Vec::new();

    for attr in &arg.attrs {
        let path = attr.path();
        if let Some((_, variant)) = SCOPE_ATTRIBUTES.iter().find(|(name, _)| path.is_ident(name)) {
            if scope.is_some() {
                return Err(SynError::new(
                    attr.span(),
                    "only one scope attribute is allowed on an injected parameter",
                ));
            }
            if path.is_ident("state") {
                if let Meta::List(_) = &attr.meta {
                    property = Some(attr.parse_args::<LitStr>()?);
                }
            } else if !matches!(&attr.meta, Meta::Path(_)) {
                return Err(SynError::new(
                    attr.span(),
                    "scope attributes other than `#[state(\"name\")]` take no arguments",
                ));
            }
            scope = Some(Ident::new(variant, attr.span()));
        } else if path.is_ident("optional") {
            optional = true;
        } else if path.is_ident("tagged") {
            let tags = attr.parse_args_with(Punctuated::<LitStr, Comma>::parse_terminated)?;
            let tags = tags.iter();
            qualifiers.push(quote! { bindery::qualifier::with_tags([#(#tags),*]) });
        } else if path.is_ident("identified_by") {
            let identity = attr.parse_args::<LitStr>()?;
            qualifiers.push(quote! { bindery::qualifier::with_id(#identity) });
        } else if path.is_ident("active") {
            qualifiers.push(quote! { bindery::qualifier::where_active() });
        } else if path.is_ident("available") {
            qualifiers.push(quote! { bindery::qualifier::where_available() });
        } else if path.is_ident("qualified") {
            let qualifier = attr.parse_args::<Expr>().map_err(|_| {
                SynError::new(
                    attr.span(),
                    "expects `#[qualified(...)]` to receive a `ServiceQualifier` value",
                )
            })?;
            qualifiers.push(quote! { #qualifier });
        }
    }

    let Some(scope) = scope else {
        return Err(SynError::new(
            span,
            "an injected parameter needs one of `#[service]`, `#[structure]`, `#[this]`, \
             `#[uses]`, `#[invocation]`, `#[state]` or `#[concern_for]`",
        ));
    };
    if (!qualifiers.is_empty() || optional) && scope != "Service" {
        return Err(SynError::new(
            span,
            "qualifiers and `#[optional]` only apply to `#[service]` parameters",
        ));
    }

    let (shape, element) = parse_shape(&arg.ty);
    if optional && shape == ShapeData::Single {
        return Err(SynError::new(
            arg.ty.span(),
            "an optional dependency should be declared as `Option<T>` or `Vec<T>`",
        ));
    }
    let handle = is_handle_type(&element);

    Ok(ArgumentData {
        span,
        name,
        scope,
        optional: optional || shape == ShapeData::Optional,
        shape,
        element,
        handle,
        qualifiers,
        property,
    })
}

fn parse_shape(ty: &Type) -> (ShapeData, Type) {
    let wrapped = |wrapper: &str| {
        let Type::Path(path) = ty else {
            return None;
        };
        let segment = path.path.segments.last()?;
        if segment.ident != wrapper {
            return None;
        }
        let PathArguments::AngleBracketed(AngleBracketedGenericArguments { args, .. }) =
            &segment.arguments
        else {
            return None;
        };
        match args.first() {
            Some(GenericArgument::Type(inner)) if args.len() == 1 => Some(inner.clone()),
            _ => None,
        }
    };

    if let Some(inner) = wrapped("Option") {
        (ShapeData::Optional, inner)
    } else if let Some(inner) = wrapped("Vec") {
        (ShapeData::Iterable, inner)
    } else {
        (ShapeData::Single, ty.clone())
    }
}

fn is_handle_type(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.path
        .segments
        .last()
        .is_some_and(|segment| HANDLE_TYPES.iter().any(|handle| segment.ident == handle))
}

fn parse_constructor_return_type(
    output: ReturnType,
    self_type: &TypePath,
) -> SynResult<ReturnTypeData> {
    let error = |span: Span| {
        SynError::new(
            span,
            "a constructor's return type should be `Self` or `Result<Self, E>`",
        )
    };
    let ReturnType::Type(_, return_type) = output else {
        return Err(error(output.span()));
    };
    let Type::Path(return_type) = *return_type else {
        return Err(error(return_type.span()));
    };
    if is_self_type(&return_type, self_type) {
        return Ok(ReturnTypeData::Infallible);
    }

    let segments = &return_type.path.segments;
    let is_result = match segments.len() {
        1 => segments[0].ident == "Result",
        3 => {
            segments[0].ident == "std" && segments[1].ident == "result" && segments[2].ident == "Result"
        }
        _ => false,
    };
    if !is_result {
        return Err(error(return_type.span()));
    }

    let Some(last) = segments.last() else {
        return Err(error(return_type.span()));
    };
    let PathArguments::AngleBracketed(AngleBracketedGenericArguments { args, .. }) =
        &last.arguments
    else {
        return Err(error(last.span()));
    };
    match (args.first(), args.get(1), args.len()) {
        (Some(GenericArgument::Type(Type::Path(ok))), Some(GenericArgument::Type(err)), 2)
            if is_self_type(ok, self_type) =>
        {
            Ok(ReturnTypeData::Result {
                error_type: err.clone(),
            })
        }
        _ => Err(error(args.span())),
    }
}

fn is_self_type(ty: &TypePath, self_type: &TypePath) -> bool {
    ty == self_type || ty.path.is_ident("Self")
}

fn expand_declaration(argument: &ArgumentData) -> TokenStream2 {
    let ArgumentData {
        name,
        scope,
        element,
        ..
    } = argument;

    let element_type = if argument.handle {
        quote! { <#element as bindery::injection::FromValue>::declared_type() }
    } else {
        quote! { bindery::types::GenericType::of::<#element>() }
    };
    let declared_type = match argument.shape {
        ShapeData::Iterable => quote! { bindery::types::GenericType::iterable(#element_type) },
        ShapeData::Single | ShapeData::Optional => element_type,
    };
    let optional = argument.optional.then(|| quote! { .optional() });
    let qualifiers = argument.qualifiers.iter();
    let property = argument.property.as_ref().map(|name| quote! { .named(#name) });

    quote! {
        bindery::dependency::DependencyDeclaration::new(
            bindery::dependency::InjectionScope::#scope,
            #name,
            #declared_type,
        )
        #optional
        #(.qualified_by(#qualifiers))*
        #property
    }
}

fn expand_take(argument: &ArgumentData, index: usize) -> TokenStream2 {
    let element = &argument.element;
    if argument.handle {
        let convert = quote! { <#element as bindery::injection::FromValue>::from_value };
        match argument.shape {
            ShapeData::Single => quote! { values.take_with(#index, #convert)? },
            ShapeData::Optional => quote! { values.take_optional_with(#index, #convert)? },
            ShapeData::Iterable => quote! { values.take_all_with(#index, #convert)? },
        }
    } else {
        match argument.shape {
            ShapeData::Single => quote! { values.take::<#element>(#index)? },
            ShapeData::Optional => quote! { values.take_optional::<#element>(#index)? },
            ShapeData::Iterable => quote! { values.take_all::<#element>(#index)? },
        }
    }
}

fn expand_fragment_implementation(
    impls: &ItemImpl,
    ctor_data: ConstructorData,
    setters: Vec<SetterData>,
    attr_data: AttributeData,
) -> SynResult<TokenStream2> {
    let self_type = &impls.self_ty;
    let (impl_generics, _, where_clause) = impls.generics.split_for_impl();
    let constructor = &ctor_data.identifier;

    let associated_type_constructed = if let AttributeData::Full { output_type, .. } = &attr_data
    {
        quote! { type Constructed = #output_type; }
    } else {
        quote! { type Constructed = Self; }
    };

    let associated_type_error =
        if let ReturnTypeData::Result { error_type } = &ctor_data.return_type {
            quote! { type Error = #error_type; }
        } else {
            quote! { type Error = std::convert::Infallible; }
        };

    let parameter_declarations = ctor_data.arguments.iter().map(expand_declaration);
    let field_declarations = setters
        .iter()
        .map(|setter| expand_declaration(&setter.argument));

    let get_dep_statements = ctor_data
        .arguments
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let dep = Ident::new(&format!("dep{i}"), arg.span);
            let take = expand_take(arg, i);
            quote! { let #dep = #take; }
        })
        .collect::<TokenStream2>();

    let dep_args = ctor_data
        .arguments
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let dep = Ident::new(&format!("dep{i}"), arg.span);
            quote! { #dep, }
        })
        .collect::<TokenStream2>();

    let wire_deps = if let ReturnTypeData::Infallible = &ctor_data.return_type {
        quote! { Ok(Ok(Self::#constructor(#dep_args))) }
    } else {
        quote! { Ok(Self::#constructor(#dep_args)) }
    };

    let inject_field = if setters.is_empty() {
        quote! {}
    } else {
        let arms = setters.iter().enumerate().map(|(i, setter)| {
            let setter_fn = &setter.identifier;
            let take = expand_take(&setter.argument, 0);
            quote! {
                #i => {
                    let value = #take;
                    self.#setter_fn(value);
                    Ok(())
                }
            }
        });
        quote! {
            fn inject_field(
                &mut self,
                field: usize,
                values: &mut bindery::injection::InjectedValues,
            ) -> std::result::Result<(), bindery::injection::InjectionError> {
                match field {
                    #(#arms)*
                    _ => Ok(()),
                }
            }
        }
    };

    let post_process_body = if let AttributeData::Full { post_processor, .. } = &attr_data {
        quote! { #post_processor(self) }
    } else {
        quote! { self }
    };

    Ok(quote! {
        impl #impl_generics bindery::fragment::Fragment for #self_type #where_clause {
            #associated_type_constructed
            #associated_type_error

            fn injection_points() -> bindery::dependency::FragmentDeclaration {
                bindery::dependency::FragmentDeclaration::new()
                    #(.parameter(#parameter_declarations))*
                    #(.field(#field_declarations))*
            }

            fn construct(values: &mut bindery::injection::InjectedValues) -> std::result::Result<
                std::result::Result<Self, Self::Error>,
                bindery::injection::InjectionError
            > {
                #get_dep_statements
                #wire_deps
            }

            #inject_field

            fn post_process(self) -> Self::Constructed {
                #post_process_body
            }
        }
    })
}
